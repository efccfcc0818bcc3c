pub const KEY_VALUE_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS KeyValue (
        key            TEXT        PRIMARY KEY,
        value          TEXT        NOT NULL
    )";
