//! Image references held in environment variables

use crate::error::{CarryallError, CarryallResult};
use crate::image::ImageRef;

/// Image references from the named variables, in order
///
/// `lookup` reads one variable; an unset or empty variable is an error.
pub fn resolve_image_vars<S, F>(names: &[S], lookup: F) -> CarryallResult<Vec<String>>
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| CarryallError::User(format!("environment variable {} is not set", name)))
        })
        .collect()
}

/// `export VAR=<reference>` lines pointing each variable at `registry`
///
/// The tag and digest of the original reference are kept; only the
/// repository moves.
pub fn image_var_exports<S, F>(names: &[S], registry: Option<&str>, lookup: F) -> CarryallResult<Vec<String>>
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<String>,
{
    let registry = registry
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or(CarryallError::RegistryRequired(names.len()))?;
    let references = resolve_image_vars(names, lookup)?;

    names
        .iter()
        .zip(references)
        .map(|(name, reference)| {
            let image: ImageRef = reference.parse()?;
            let retargeted = ImageRef {
                name: image.retarget(Some(registry)),
                ..image
            };
            Ok(format!("export {}={}", name.as_ref(), retargeted))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("API_IMAGE", "ghcr.io/acme/api:v2"),
            (
                "DB_IMAGE",
                "postgres:16@sha256:be7f30e6cbaed8d8e2537d857c6507fb57dcbc1ceb24a0de35ebe30cc75dba12",
            ),
            ("EMPTY", " "),
        ])
    }

    fn lookup(name: &str) -> Option<String> {
        env().get(name).map(|v| v.to_string())
    }

    #[test]
    fn exports_retarget_and_keep_qualifiers() {
        let lines = image_var_exports(&["API_IMAGE", "DB_IMAGE"], Some("registry.airgap:5000"), lookup).unwrap();
        assert_eq!(
            lines,
            vec![
                "export API_IMAGE=registry.airgap:5000/api:v2".to_string(),
                "export DB_IMAGE=registry.airgap:5000/postgres:16@sha256:be7f30e6cbaed8d8e2537d857c6507fb57dcbc1ceb24a0de35ebe30cc75dba12".to_string(),
            ]
        );
    }

    #[test]
    fn registry_is_required() {
        let err = image_var_exports(&["API_IMAGE"], None, lookup).unwrap_err();
        assert!(matches!(err, CarryallError::RegistryRequired(1)));
    }

    #[test]
    fn unset_variables_are_reported() {
        let err = resolve_image_vars(&["API_IMAGE", "MISSING"], lookup).unwrap_err();
        assert!(err.to_string().contains("MISSING"));
        assert!(resolve_image_vars(&["EMPTY"], lookup).is_err());
    }

    #[test]
    fn resolves_in_order() {
        let images = resolve_image_vars(&["DB_IMAGE", "API_IMAGE"], lookup).unwrap();
        assert_eq!(images[1], "ghcr.io/acme/api:v2");
    }
}
