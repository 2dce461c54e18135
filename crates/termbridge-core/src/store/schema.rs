//! SQLite Schema Definitions for the Reference Table
//!
//! The persisted table mirrors the reference file column for column. Each
//! file version gets its own table, named from the content fingerprint, so
//! two versions never alias.

/// Reference-file columns, in positional order
pub const COLUMNS: [&str; 18] = [
    "CUI", "LAT", "TS", "LUI", "STT", "SUI", "ISPREF", "AUI", "SAUI", "SCUI", "SDUI", "SAB", "TTY",
    "CODE", "STR", "SRL", "SUPPRESS", "CVF",
];

/// Number of fields every record must carry
pub const COLUMN_COUNT: usize = COLUMNS.len();

/// Column names for half-map queries (in order for row mapping)
pub const HALFMAP_COLUMNS: &str = "CUI, AUI, SAB, CODE, STR";

/// Default table name prefix
pub const DEFAULT_TABLE_PREFIX: &str = "MRCONSO";

/// Suffix of the table a rebuild loads into before it is renamed
const STAGING_SUFFIX: &str = "__staging";

/// Table name for a file version: `{prefix}_{fingerprint}`
pub fn table_name(prefix: &str, fingerprint: &str) -> String {
    format!("{}_{}", prefix, fingerprint)
}

/// Name of the staging table used while `table` is rebuilt
pub fn staging_name(table: &str) -> String {
    format!("{}{}", table, STAGING_SUFFIX)
}

/// Whether `name` is a plain SQL identifier (safe to interpolate)
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// SQL to create the reference table
pub fn create_table_sql(table: &str) -> String {
    let columns = COLUMNS
        .iter()
        .map(|c| format!("    {} TEXT NOT NULL", c))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("CREATE TABLE \"{}\" (\n{}\n)", table, columns)
}

/// SQL to insert one record
pub fn insert_sql(table: &str) -> String {
    let placeholders = vec!["?"; COLUMN_COUNT].join(", ");
    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        table,
        COLUMNS.join(", "),
        placeholders
    )
}

/// SQL to create the lookup indexes
///
/// SAB and CODE serve the half-map equality lookups; CUI and AUI serve the
/// concept/atom lookups.
pub fn create_indexes_sql(table: &str) -> String {
    ["SAB", "CODE", "CUI", "AUI"]
        .iter()
        .map(|column| {
            format!(
                "CREATE INDEX IF NOT EXISTS \"idx_{table}_{col}\" ON \"{table}\"({column});",
                table = table,
                col = column.to_ascii_lowercase(),
                column = column
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Comma-separated `?` placeholders for an `IN (...)` clause
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
