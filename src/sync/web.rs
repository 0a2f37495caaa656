//! Web file specifications

use crate::error::{CarryallError, CarryallResult};
use std::str::FromStr;

/// A file to download: `url,filename,sha256[,true|false]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebFile {
    pub url: String,
    /// Name of the file inside the archive directory
    pub file_name: String,
    /// Expected SHA256, lowercase hex
    pub sha256: String,
    /// Whether the download should be marked executable
    pub executable: bool,
}

impl FromStr for WebFile {
    type Err = CarryallError;

    fn from_str(spec: &str) -> CarryallResult<Self> {
        let invalid = || CarryallError::InvalidWebFile {
            spec: spec.to_string(),
        };

        let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(invalid());
        }

        let (url, file_name, sha256) = (parts[0], parts[1], parts[2]);
        if url.is_empty()
            || file_name.is_empty()
            || file_name.contains(['/', '\\'])
            || file_name == "."
            || file_name == ".."
        {
            return Err(invalid());
        }
        if sha256.len() != 64 || !sha256.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let executable = parts
            .get(3)
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true"));

        Ok(Self {
            url: url.to_string(),
            file_name: file_name.to_string(),
            sha256: sha256.to_ascii_lowercase(),
            executable,
        })
    }
}

/// Parse whitespace-separated web file specifications
pub fn parse_web_files<S: AsRef<str>>(specs: &[S]) -> CarryallResult<Vec<WebFile>> {
    specs
        .iter()
        .flat_map(|s| s.as_ref().split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .map(|s| s.parse())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn parse_three_fields() {
        let file: WebFile = format!("https://example.com/a.tgz,a.tgz,{SHA}").parse().unwrap();
        assert_eq!(file.url, "https://example.com/a.tgz");
        assert_eq!(file.file_name, "a.tgz");
        assert_eq!(file.sha256, SHA);
        assert!(!file.executable);
    }

    #[test]
    fn parse_executable_flag() {
        let file: WebFile = format!("https://example.com/kubectl,kubectl,{},TRUE", SHA.to_uppercase())
            .parse()
            .unwrap();
        assert!(file.executable);
        assert_eq!(file.sha256, SHA);

        let file: WebFile = format!("https://example.com/kubectl,kubectl,{SHA},false")
            .parse()
            .unwrap();
        assert!(!file.executable);
    }

    #[test]
    fn parse_rejects_bad_specs() {
        for bad in [
            "https://example.com/a,a".to_string(),
            format!("https://example.com/a,sub/a,{SHA}"),
            format!("https://example.com/a,..,{SHA}"),
            "https://example.com/a,a,nothex".to_string(),
            format!("https://example.com/a,a,{SHA},true,extra"),
        ] {
            assert!(
                matches!(bad.parse::<WebFile>(), Err(CarryallError::InvalidWebFile { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn parse_list_splits_whitespace() {
        let specs = vec![format!(
            "https://e.com/a,a,{SHA} https://e.com/b,b,{SHA},true"
        )];
        let files = parse_web_files(&specs).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[1].executable);
    }
}
