//! Connection options.

use url::Url;

use crate::cursor::CursorKind;
use crate::error::Error;
use crate::rewrite::DEFAULT_MAX_STATEMENT_LENGTH;

/// Connection options for MySQL.
///
/// The address and credential fields are carried for whoever establishes
/// the transport; the cursor engine itself reads the remaining fields.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Hostname or IP address.
    ///
    /// Default: `""`
    pub host: String,

    /// Port number for the MySQL server.
    ///
    /// Default: `3306`
    pub port: u16,

    /// Unix socket path.
    ///
    /// Default: `None`
    pub socket: Option<String>,

    /// Username for authentication.
    ///
    /// Default: `""`
    pub user: String,

    /// Database name to use.
    ///
    /// Default: `None`
    pub database: Option<String>,

    /// Password for authentication.
    ///
    /// Default: `None`
    pub password: Option<String>,

    /// Kind of cursor returned by `Conn::cursor()`.
    ///
    /// Default: `CursorKind::Buffered`
    pub cursor: CursorKind,

    /// Rows carry column names and can be read by name.
    ///
    /// Default: `false`
    pub named_rows: bool,

    /// Upper bound in bytes for one statement built by `executemany`.
    ///
    /// Default: `1024000`
    pub max_statement_length: usize,

    /// Autocommit mode applied when the connection is created.
    /// `None` keeps the server default.
    ///
    /// Default: `None`
    pub autocommit: Option<bool>,

    /// Additional connection parameters.
    ///
    /// Default: `[]`
    pub params: Vec<(String, String)>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 3306,
            socket: None,
            user: String::new(),
            database: None,
            password: None,
            cursor: CursorKind::Buffered,
            named_rows: false,
            max_statement_length: DEFAULT_MAX_STATEMENT_LENGTH,
            autocommit: None,
            params: Vec::new(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value {
        "true" | "True" | "1" | "yes" | "on" => Ok(true),
        "false" | "False" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidUsage(format!("Invalid {key}: {value}"))),
    }
}

impl TryFrom<&Url> for Opts {
    type Error = Error;

    /// Parse a MySQL connection URL.
    ///
    /// Format: `mysql://[user[:password]@]host[:port][/database][?param1=value1&param2=value2&..]`
    ///
    /// Supported query parameters:
    /// - `cursor`: buffered, unbuffered
    /// - `named_rows`: true/True/1/yes/on or false/False/0/no/off
    /// - `max_statement_length`: positive integer
    /// - `autocommit`: boolean as above
    /// - `socket`: Unix socket path
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if url.scheme() != "mysql" {
            return Err(Error::InvalidUsage(format!(
                "Invalid scheme: expected 'mysql://', got '{}://'",
                url.scheme()
            )));
        }

        let mut opts = Opts {
            host: url.host_str().unwrap_or("localhost").to_string(),
            port: url.port().unwrap_or(3306),
            user: url.username().to_string(),
            password: url.password().map(|s| s.to_string()),
            database: url.path().strip_prefix('/').and_then(|s| {
                if s.is_empty() {
                    None
                } else {
                    Some(s.to_string())
                }
            }),
            ..Opts::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "cursor" => {
                    opts.cursor = match value.as_ref() {
                        "buffered" => CursorKind::Buffered,
                        "unbuffered" => CursorKind::Unbuffered,
                        _ => {
                            return Err(Error::InvalidUsage(format!(
                                "Invalid cursor: expected one of ['buffered', 'unbuffered'], got {value}"
                            )));
                        }
                    };
                }
                "named_rows" => opts.named_rows = parse_bool("named_rows", &value)?,
                "autocommit" => opts.autocommit = Some(parse_bool("autocommit", &value)?),
                "max_statement_length" => {
                    let length: usize = value.parse().map_err(|_| {
                        Error::InvalidUsage(format!("Invalid max_statement_length: {value}"))
                    })?;
                    if length == 0 {
                        return Err(Error::InvalidUsage(
                            "Invalid max_statement_length: must be positive".into(),
                        ));
                    }
                    opts.max_statement_length = length;
                }
                "socket" => opts.socket = Some(value.to_string()),
                _ => {
                    opts.params.push((key.to_string(), value.to_string()));
                }
            }
        }

        Ok(opts)
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(s).map_err(|e| Error::InvalidUsage(format!("Invalid URL: {e}")))?;
        Self::try_from(&url)
    }
}
