//! Client identity derivation.

use crate::error::{MayflyError, Result};

/// A key that identifies one quota bucket.
///
/// Composed of the client address and, when present, the credential the
/// request was made with. Requests sharing a key share a quota.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    address: String,
    credential: Option<String>,
}

impl ClientKey {
    /// Create a key from an address and optional credential.
    ///
    /// Blank values count as absent; a blank address is rejected.
    pub fn new(address: &str, credential: Option<&str>) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(MayflyError::UnresolvableClient);
        }

        Ok(Self {
            address: address.to_string(),
            credential: non_blank(credential).map(str::to_string),
        })
    }

    /// Resolve a key from request metadata.
    ///
    /// The first entry of a forwarded-for header wins over the direct
    /// connection address. Only that first hop is used, not the raw header,
    /// so one client keeps one bucket behind different proxy chains.
    pub fn resolve(
        forwarded_for: Option<&str>,
        remote_addr: Option<&str>,
        credential: Option<&str>,
    ) -> Result<Self> {
        let forwarded = forwarded_for
            .and_then(|header| header.split(',').next())
            .and_then(|first| non_blank(Some(first)));

        let address = forwarded
            .or_else(|| non_blank(remote_addr))
            .ok_or(MayflyError::UnresolvableClient)?;

        Self::new(address, credential)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// The bucket identifier: `address:credential` or just `address`.
    pub fn to_string_key(&self) -> String {
        match &self.credential {
            Some(credential) => format!("{}:{}", self.address, credential),
            None => self.address.clone(),
        }
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_with_credential() {
        let key = ClientKey::new("203.0.113.7", Some("mk-secret")).unwrap();
        assert_eq!(key.to_string_key(), "203.0.113.7:mk-secret");
        assert_eq!(key.credential(), Some("mk-secret"));
    }

    #[test]
    fn test_key_without_credential() {
        let key = ClientKey::new("203.0.113.7", None).unwrap();
        assert_eq!(key.to_string_key(), "203.0.113.7");

        let blank = ClientKey::new("203.0.113.7", Some("  ")).unwrap();
        assert_eq!(blank, key);
    }

    #[test]
    fn test_blank_address_rejected() {
        assert!(matches!(
            ClientKey::new("   ", Some("mk-secret")),
            Err(MayflyError::UnresolvableClient)
        ));
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let key = ClientKey::resolve(
            Some(" 198.51.100.1 , 10.0.0.1"),
            Some("10.0.0.254"),
            None,
        )
        .unwrap();
        assert_eq!(key.address(), "198.51.100.1");
    }

    #[test]
    fn test_falls_back_to_remote_addr() {
        let key = ClientKey::resolve(Some(""), Some("10.0.0.254"), Some("k")).unwrap();
        assert_eq!(key.to_string_key(), "10.0.0.254:k");
    }

    #[test]
    fn test_unresolvable() {
        assert!(matches!(
            ClientKey::resolve(None, None, Some("k")),
            Err(MayflyError::UnresolvableClient)
        ));
    }
}
