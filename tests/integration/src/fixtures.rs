//! Sample migrations for integration tests

/// A SQL migration used by tests.
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    /// `YYYYMMDDHHMMSS`
    pub stamp: &'static str,
    /// File name part
    pub name: &'static str,
    /// Up section
    pub up: &'static str,
    /// Down section
    pub down: &'static str,
    /// Table the migration creates
    pub table: &'static str,
}

/// Creates `users`
pub const USERS: Fixture = Fixture {
    stamp: "20230115120000",
    name: "create_users",
    up: "CREATE TABLE users (id INTEGER PRIMARY KEY, email VARCHAR(255) NOT NULL);",
    down: "DROP TABLE users;",
    table: "users",
};

/// Creates `posts`
pub const POSTS: Fixture = Fixture {
    stamp: "20230116120000",
    name: "create_posts",
    up: "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT);\n\
         CREATE INDEX idx_posts_user ON posts(user_id);",
    down: "DROP INDEX idx_posts_user;\nDROP TABLE posts;",
    table: "posts",
};

/// Creates `comments`
pub const COMMENTS: Fixture = Fixture {
    stamp: "20230117120000",
    name: "create_comments",
    up: "CREATE TABLE comments (id INTEGER PRIMARY KEY, post_id INTEGER, body TEXT);",
    down: "DROP TABLE comments;",
    table: "comments",
};

/// Users, posts and comments, in version order
pub fn standard_set() -> [Fixture; 3] {
    [USERS, POSTS, COMMENTS]
}

/// A migration whose up section is invalid SQL
pub fn broken_up(stamp: &'static str) -> Fixture {
    Fixture {
        stamp,
        name: "broken_up",
        up: "CREATE TABLE broken (id INTEGER);\nCREATE TABLE;",
        down: "DROP TABLE broken;",
        table: "broken",
    }
}

/// A migration whose down section is invalid SQL
pub fn broken_down(stamp: &'static str) -> Fixture {
    Fixture {
        stamp,
        name: "broken_down",
        up: "CREATE TABLE sticky (id INTEGER);",
        down: "DROP TABLE no_such_table;",
        table: "sticky",
    }
}
