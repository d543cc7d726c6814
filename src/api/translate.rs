//! Native database error codes to HTTP statuses.
//!
//! Pure functions; `authenticated` only matters for privilege errors,
//! which become 401 for anonymous callers and 403 otherwise.

use crate::db::DbError;

fn privilege_status(authenticated: bool) -> u16 {
    if authenticated {
        403
    } else {
        401
    }
}

/// Map a PostgreSQL SQLSTATE to a status.
///
/// `PTxyz` codes raised by user code carry the status in their last three
/// characters.
pub fn status_from_pg_code(code: &str, authenticated: bool) -> u16 {
    const TABLE: &[(&str, u16)] = &[
        ("08", 503),    // connection exception
        ("09", 500),    // triggered action exception
        ("0L", 403),    // invalid grantor
        ("0P", 403),    // invalid role specification
        ("23503", 409), // foreign key violation
        ("23505", 409), // unique violation
        ("25006", 405), // read only sql transaction
        ("25", 500),    // invalid transaction state
        ("28", 403),    // invalid authorization specification
        ("2D", 500),    // invalid transaction termination
        ("38", 500),    // external routine exception
        ("39", 500),    // external routine invocation exception
        ("3B", 500),    // savepoint exception
        ("40", 500),    // transaction rollback
        ("53", 503),    // insufficient resources
        ("54", 413),    // program limit exceeded
        ("55", 500),    // object not in prerequisite state
        ("57", 500),    // operator intervention
        ("58", 500),    // system error
        ("F0", 500),    // config file error
        ("HV", 500),    // foreign data wrapper error
        ("P0001", 400), // raise_exception default
        ("P0", 500),    // plpgsql error
        ("XX", 500),    // internal error
        ("42883", 404), // undefined function
        ("42P01", 404), // undefined table
    ];

    if let Some((_, status)) = TABLE.iter().find(|(prefix, _)| code.starts_with(prefix)) {
        return *status;
    }
    if code.starts_with("42501") {
        return privilege_status(authenticated);
    }
    if let Some(rest) = code.strip_prefix("PT") {
        return rest
            .get(..3)
            .and_then(|s| s.parse::<u16>().ok())
            .filter(|s| *s != 0)
            .unwrap_or(500);
    }
    400
}

/// Map an SQLite symbolic result code (`SQLITE_BUSY`, extended codes too)
pub fn status_from_sqlite_code(code: &str, authenticated: bool) -> u16 {
    const TABLE: &[(&str, u16)] = &[
        ("SQLITE_ABORT", 503),
        ("SQLITE_BUSY", 503),
        ("SQLITE_CANTOPEN", 500),
        ("SQLITE_CONSTRAINT", 409),
        ("SQLITE_CORRUPT", 500),
        ("SQLITE_NOTADB", 500),
        ("SQLITE_ERROR", 400),
        ("SQLITE_FULL", 507),
        ("SQLITE_IOERR", 500),
        ("SQLITE_LOCKED", 423),
        ("SQLITE_MISMATCH", 409),
        ("SQLITE_MISUSE", 500),
        ("SQLITE_NOMEM", 507),
        ("SQLITE_PERM", 403),
        ("SQLITE_READONLY", 403),
        ("SQLITE_TOOBIG", 413),
    ];

    if code.contains("SQLITE_AUTH") {
        return privilege_status(authenticated);
    }
    TABLE
        .iter()
        .find(|(name, _)| code.contains(name))
        .map(|(_, status)| *status)
        .unwrap_or(400)
}

/// Map a MySQL error number
pub fn status_from_mysql_code(code: u16, authenticated: bool) -> u16 {
    match code {
        // duplicate entry, foreign key parent/child violations
        1062 | 1451 | 1452 | 1216 | 1217 => 409,
        // access denied
        1044 | 1045 | 1142 | 1143 | 1227 => privilege_status(authenticated),
        // unknown table or routine
        1146 | 1305 => 404,
        // write in read only transaction
        1792 => 405,
        // SIGNAL with the default SQLSTATE
        1644 => 400,
        // connection loss, too many connections, lock timeout, deadlock
        2002 | 2003 | 2006 | 2013 | 1040 | 1205 | 1213 => 503,
        _ => 500,
    }
}

/// Status for any driver error
pub fn status_for_db_error(err: &DbError, authenticated: bool) -> u16 {
    match err {
        DbError::Postgres { code, .. } => status_from_pg_code(code, authenticated),
        DbError::Sqlite { code, .. } => status_from_sqlite_code(code, authenticated),
        DbError::MySql { code, .. } => status_from_mysql_code(*code, authenticated),
        DbError::Driver(_) => 500,
    }
}
