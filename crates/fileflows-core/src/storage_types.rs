use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Backend a location resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Local,
    S3,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "s3" => Ok(Backend::S3),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::S3 => write!(f, "s3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("S3".parse::<Backend>().unwrap(), Backend::S3);
        assert_eq!("local".parse::<Backend>().unwrap(), Backend::Local);
        assert!("nfs".parse::<Backend>().is_err());
    }

    #[test]
    fn backend_display_matches_parse() {
        for backend in [Backend::Local, Backend::S3] {
            assert_eq!(backend.to_string().parse::<Backend>().unwrap(), backend);
        }
    }
}
