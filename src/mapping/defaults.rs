//! Built-in mapping tables, used directly and as the fallback when a
//! mapping file cannot be loaded.

pub(super) const TYPES: &[(&str, &str)] = &[
    ("NUMBER", "NUMERIC"),
    ("NUMERIC", "NUMERIC"),
    ("DECIMAL", "DECIMAL"),
    ("INTEGER", "INTEGER"),
    ("INT", "INTEGER"),
    ("SMALLINT", "SMALLINT"),
    ("PLS_INTEGER", "INTEGER"),
    ("BINARY_INTEGER", "INTEGER"),
    ("SIMPLE_INTEGER", "INTEGER"),
    ("NATURAL", "INTEGER"),
    ("POSITIVE", "INTEGER"),
    ("FLOAT", "DOUBLE PRECISION"),
    ("BINARY_FLOAT", "REAL"),
    ("BINARY_DOUBLE", "DOUBLE PRECISION"),
    ("VARCHAR2", "VARCHAR"),
    ("NVARCHAR2", "VARCHAR"),
    ("VARCHAR", "VARCHAR"),
    ("CHAR", "CHAR"),
    ("NCHAR", "CHAR"),
    ("CLOB", "TEXT"),
    ("NCLOB", "TEXT"),
    ("LONG", "TEXT"),
    ("BLOB", "BYTEA"),
    ("RAW", "BYTEA"),
    ("LONG RAW", "BYTEA"),
    ("DATE", "TIMESTAMP(0)"),
    ("TIMESTAMP", "TIMESTAMP"),
    ("TIMESTAMP WITH TIME ZONE", "TIMESTAMPTZ"),
    ("TIMESTAMP WITH LOCAL TIME ZONE", "TIMESTAMPTZ"),
    ("BOOLEAN", "BOOLEAN"),
    ("ROWID", "TEXT"),
    ("UROWID", "TEXT"),
    ("XMLTYPE", "XML"),
];

/// PostgreSQL types that take a size/precision modifier.
pub(super) const SIZED_TYPES: &[&str] = &[
    "NUMERIC",
    "DECIMAL",
    "VARCHAR",
    "CHAR",
    "CHARACTER",
    "CHARACTER VARYING",
    "TIMESTAMP",
    "TIMESTAMPTZ",
    "TIME",
    "TIMETZ",
    "BIT",
    "VARBIT",
];

/// Function templates. `{n}` is the n-th argument, `{*}` all arguments. A
/// value without placeholders is a plain rename. A `/n` suffix on the key
/// restricts the entry to calls with n arguments; a key written as a whole
/// call overrides that exact call.
pub(super) const FUNCTIONS: &[(&str, &str)] = &[
    ("NVL", "COALESCE({1}, {2})"),
    ("NVL2", "CASE WHEN {1} IS NOT NULL THEN {2} ELSE {3} END"),
    ("SUBSTR/2", "SUBSTRING({1} FROM {2})"),
    ("SUBSTR/3", "SUBSTRING({1} FROM {2} FOR {3})"),
    ("INSTR/2", "POSITION({2} IN {1})"),
    ("ADD_MONTHS/2", "({1} + ({2}) * INTERVAL '1 month')"),
    ("LENGTH", "LENGTH"),
    ("UPPER", "UPPER"),
    ("LOWER", "LOWER"),
    ("INITCAP", "INITCAP"),
    ("TRIM", "TRIM"),
    ("LTRIM", "LTRIM"),
    ("RTRIM", "RTRIM"),
    ("LPAD", "LPAD"),
    ("RPAD", "RPAD"),
    ("REPLACE", "REPLACE"),
    ("CONCAT", "CONCAT"),
    ("CHR", "CHR"),
    ("ASCII", "ASCII"),
    ("TO_CHAR", "TO_CHAR"),
    ("TO_DATE", "TO_DATE"),
    ("TO_NUMBER", "TO_NUMBER"),
    ("TO_TIMESTAMP", "TO_TIMESTAMP"),
    ("TRUNC", "TRUNC"),
    ("ROUND", "ROUND"),
    ("ABS", "ABS"),
    ("CEIL", "CEIL"),
    ("FLOOR", "FLOOR"),
    ("MOD", "MOD"),
    ("POWER", "POWER"),
    ("SQRT", "SQRT"),
    ("SIGN", "SIGN"),
    ("GREATEST", "GREATEST"),
    ("LEAST", "LEAST"),
    ("COALESCE", "COALESCE"),
    ("NULLIF", "NULLIF"),
    ("CAST", "CAST"),
    ("EXTRACT", "EXTRACT"),
    ("REGEXP_REPLACE", "REGEXP_REPLACE"),
    ("COUNT", "COUNT"),
    ("SUM", "SUM"),
    ("MIN", "MIN"),
    ("MAX", "MAX"),
    ("AVG", "AVG"),
    ("SYSDATE", "CURRENT_TIMESTAMP"),
    ("SYSTIMESTAMP", "CURRENT_TIMESTAMP"),
    ("TRUNC(SYSDATE)", "CURRENT_DATE"),
    ("USER", "CURRENT_USER"),
    ("SQLCODE", "SQLSTATE"),
    ("SQLERRM", "SQLERRM"),
];

pub(super) const EXCEPTIONS: &[(&str, &str)] = &[
    ("NO_DATA_FOUND", "No data found"),
    ("TOO_MANY_ROWS", "Query returned more than one row"),
    ("DUP_VAL_ON_INDEX", "Duplicate value on unique index"),
    ("ZERO_DIVIDE", "Division by zero"),
    ("VALUE_ERROR", "Numeric or value error"),
    ("INVALID_NUMBER", "Invalid number"),
    ("CASE_NOT_FOUND", "Case not found"),
];

/// Oracle predefined exceptions and the PostgreSQL condition names that
/// catch the equivalent errors.
pub(super) const CONDITIONS: &[(&str, &str)] = &[
    ("OTHERS", "OTHERS"),
    ("NO_DATA_FOUND", "no_data_found"),
    ("TOO_MANY_ROWS", "too_many_rows"),
    ("DUP_VAL_ON_INDEX", "unique_violation"),
    ("ZERO_DIVIDE", "division_by_zero"),
    ("VALUE_ERROR", "data_exception"),
    ("INVALID_NUMBER", "invalid_text_representation"),
    ("CASE_NOT_FOUND", "case_not_found"),
    ("INVALID_CURSOR", "invalid_cursor_state"),
    ("CURSOR_ALREADY_OPEN", "duplicate_cursor"),
    ("TIMEOUT_ON_RESOURCE", "lock_not_available"),
];

/// Oracle error codes commonly bound by `PRAGMA EXCEPTION_INIT`, and the
/// PostgreSQL conditions raised for the same failures.
pub(super) const ERROR_CODES: &[(i64, &str)] = &[
    (-1, "unique_violation"),
    (-54, "lock_not_available"),
    (-60, "deadlock_detected"),
    (100, "no_data_found"),
    (-1403, "no_data_found"),
    (-1422, "too_many_rows"),
    (-1400, "not_null_violation"),
    (-1407, "not_null_violation"),
    (-1438, "numeric_value_out_of_range"),
    (-1476, "division_by_zero"),
    (-1722, "invalid_text_representation"),
    (-2290, "check_violation"),
    (-2291, "foreign_key_violation"),
    (-2292, "foreign_key_violation"),
    (-12899, "string_data_right_truncation"),
];
