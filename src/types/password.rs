use zeroize::Zeroizing;

/// A passphrase used to derive keys through S2K.
///
/// Either a fixed value or a callback that is asked every time the
/// passphrase is needed, so prompts can be deferred until a secret key
/// actually has to be unlocked.
#[derive(derive_more::Debug)]
pub enum Password {
    Dynamic(#[debug("Box<Fn>")] Box<dyn Fn() -> Zeroizing<Vec<u8>> + 'static + Send + Sync>),
    Static(#[debug("***")] Zeroizing<Vec<u8>>),
}

impl Password {
    /// The empty passphrase, used for keys stored without protection.
    pub fn empty() -> Self {
        Self::Static(Vec::new().into())
    }

    /// Returns the passphrase bytes.
    pub fn read(&self) -> Zeroizing<Vec<u8>> {
        match self {
            Self::Dynamic(f) => f(),
            Self::Static(s) => s.clone(),
        }
    }
}

impl Default for Password {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        value.as_bytes().into()
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

impl From<&[u8]> for Password {
    fn from(value: &[u8]) -> Self {
        Self::Static(Zeroizing::new(value.to_vec()))
    }
}

impl<F: Fn() -> Zeroizing<Vec<u8>> + 'static + Send + Sync> From<F> for Password {
    fn from(value: F) -> Self {
        Self::Dynamic(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_sources() {
        assert_eq!(&Password::from("test").read()[..], b"test");
        assert!(Password::empty().read().is_empty());

        let dynamic = Password::from(|| Zeroizing::new(b"later".to_vec()));
        assert_eq!(&dynamic.read()[..], b"later");
        assert_eq!(format!("{:?}", Password::from("secret")), "Static(***)");
    }
}
