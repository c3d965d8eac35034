pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
"#;

pub const SCHEMA: &str = r#"
-- Sources: watched root directories
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Font files: one row per physical file ever seen
CREATE TABLE IF NOT EXISTS font_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER,
    path TEXT NOT NULL UNIQUE,
    extension TEXT NOT NULL,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    modified_at INTEGER,             -- unix millis
    last_seen_at INTEGER NOT NULL,   -- unix millis
    status TEXT NOT NULL DEFAULT 'ok',  -- 'ok', 'error', 'missing'
    error_message TEXT,
    FOREIGN KEY (source_id) REFERENCES sources(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_font_files_source ON font_files(source_id);
CREATE INDEX IF NOT EXISTS idx_font_files_status ON font_files(status);

-- Families: keyed by the normalized family name
CREATE TABLE IF NOT EXISTS families (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    family_key TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL
);

-- Faces: replaced wholesale on every successful rescan of their file
CREATE TABLE IF NOT EXISTS faces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    family_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    face_index INTEGER NOT NULL DEFAULT 0,
    postscript_name TEXT,
    full_name TEXT,
    style_name TEXT,
    weight REAL,
    width REAL,
    slant REAL,
    is_italic INTEGER NOT NULL DEFAULT 0,
    is_variable INTEGER NOT NULL DEFAULT 0,
    activated INTEGER NOT NULL DEFAULT 0,
    preview_supported INTEGER NOT NULL DEFAULT 1,
    install_supported INTEGER NOT NULL DEFAULT 0,
    UNIQUE (file_id, face_index),
    FOREIGN KEY (family_id) REFERENCES families(id) ON DELETE CASCADE,
    FOREIGN KEY (file_id) REFERENCES font_files(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_faces_family ON faces(family_id);
CREATE INDEX IF NOT EXISTS idx_faces_file ON faces(file_id);

-- Facet columns: user-defined tagging dimensions
CREATE TABLE IF NOT EXISTS facet_columns (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    column_key TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    column_type TEXT NOT NULL,  -- 'single_select', 'multi_select', 'boolean'
    position INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS facet_values (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    column_id INTEGER NOT NULL,
    value_key TEXT NOT NULL,
    display_name TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    UNIQUE (column_id, value_key),
    FOREIGN KEY (column_id) REFERENCES facet_columns(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS family_facet_values (
    family_id INTEGER NOT NULL,
    value_id INTEGER NOT NULL,
    PRIMARY KEY (family_id, value_id),
    FOREIGN KEY (family_id) REFERENCES families(id) ON DELETE CASCADE,
    FOREIGN KEY (value_id) REFERENCES facet_values(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_family_facet_values_value ON family_facet_values(value_id);

-- Scan history
CREATE TABLE IF NOT EXISTS scans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER,
    started_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    completed_at TEXT,
    files_scanned INTEGER DEFAULT 0,
    files_failed INTEGER DEFAULT 0,
    files_missing INTEGER DEFAULT 0,
    status TEXT DEFAULT 'running',  -- 'running', 'completed', 'failed'
    FOREIGN KEY (source_id) REFERENCES sources(id) ON DELETE SET NULL
);
"#;
