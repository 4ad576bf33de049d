use rand::Rng;

/// Alias for integer database row ids.
pub type DatabaseId = i64;

/// Generate a random id for a new account, purchase, or payment.
///
/// Ids are caller-generated so that a row keeps the same key in the local
/// store and in the remote document tree. Drawing from the full positive
/// `i64` range makes collisions unlikely but not impossible; inserts still
/// surface [crate::Error::DuplicateId] when one happens.
pub fn generate_id() -> DatabaseId {
    rand::thread_rng().gen_range(1..DatabaseId::MAX)
}

#[cfg(test)]
mod generate_id_tests {
    use super::generate_id;

    #[test]
    fn ids_are_positive() {
        for _ in 0..1000 {
            assert!(generate_id() > 0);
        }
    }
}
