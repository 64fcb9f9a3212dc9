use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    // unknown error
    UnknownError = 1000,
    // argument out of range: device, port, value or batch size
    ValidationError = 1001,
    // card absent or hardware fault while communicating
    ConnectionFailure = 1002,
    // settings file error
    ConfigError = 1003,
}

/// Raised synchronously to the caller when a device id, port, value or batch
/// size is out of range. `field` names the offending argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub msg: String,
}

impl ValidationError {
    pub fn new(field: &'static str, msg: impl Into<String>) -> Self {
        Self { field, msg: msg.into() }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::ValidationError
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "validation error code: {}, field: {}, msg: {}", self.code() as u16, self.field, self.msg)
    }
}

impl Error for ValidationError {}

// hardware driver error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError(pub String);

impl DriverError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::ConnectionFailure
    }
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "driver error code: {}, msg: {}", self.code() as u16, self.0)
    }
}

impl Error for DriverError {}

// settings error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "config error code: {}, msg: {}", ErrorCode::ConfigError as u16, self.0)
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field() {
        let e = ValidationError::new("port", "port 9 is out of range 1..=8");
        assert_eq!(e.field, "port");
        assert_eq!(e.code(), ErrorCode::ValidationError);
        let text = e.to_string();
        assert!(text.contains("1001"));
        assert!(text.contains("field: port"));
    }

    #[test]
    fn test_driver_error_maps_to_connection_failure() {
        let e = DriverError("usb transfer failed".to_string());
        assert_eq!(e.code(), ErrorCode::ConnectionFailure);
        assert!(e.to_string().contains("usb transfer failed"));
    }
}
