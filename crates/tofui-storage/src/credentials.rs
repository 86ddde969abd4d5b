use crate::{get_json, set_json, KeyValueStore, StorageError};
use tofui_core::{Credential, SessionIdentity};

pub const CREDENTIAL_PREFIX: &str = "signer:";

pub fn credential_key(identity: &SessionIdentity) -> String {
    format!("{CREDENTIAL_PREFIX}{identity}")
}

pub fn load_credential(
    store: &dyn KeyValueStore,
    identity: &SessionIdentity,
) -> Result<Option<Credential>, StorageError> {
    get_json(store, &credential_key(identity))
}

/// Persists the credential for `identity`, replacing any previous one.
pub fn save_credential(
    store: &dyn KeyValueStore,
    identity: &SessionIdentity,
    credential: &Credential,
) -> Result<(), StorageError> {
    set_json(store, &credential_key(identity), credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteStore;

    #[test]
    fn credentials_are_keyed_by_identity() {
        let store = SqliteStore::open_in_memory().expect("open store");
        let alice = SessionIdentity::from_public_key(b"alice-key");
        let bob = SessionIdentity::from_public_key(b"bob-key");

        assert_eq!(load_credential(&store, &alice).expect("load"), None);

        let credential = Credential::new(42, "abc").with_username("alice");
        save_credential(&store, &alice, &credential).expect("save");

        assert_eq!(
            load_credential(&store, &alice).expect("load"),
            Some(credential)
        );
        assert_eq!(load_credential(&store, &bob).expect("load"), None);
        assert_eq!(
            credential_key(&alice),
            format!("signer:{}", alice.as_str())
        );
    }

    #[test]
    fn later_sign_in_overwrites() {
        let store = SqliteStore::open_in_memory().expect("open store");
        let identity = SessionIdentity::local();

        save_credential(&store, &identity, &Credential::new(1, "first")).expect("save");
        save_credential(&store, &identity, &Credential::new(2, "second")).expect("save");

        let loaded = load_credential(&store, &identity)
            .expect("load")
            .expect("credential present");
        assert_eq!(loaded.fid, 2);
        assert_eq!(loaded.token, "second");
    }
}
