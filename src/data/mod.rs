pub mod account;
pub mod assignment;
pub mod lesson;
pub mod todo;

/// Filter documents shared by the data modules.
pub mod filter {
    use bson::spec::BinarySubtype;
    use bson::{doc, Bson, Document};
    use uuid::Uuid;

    /// Uuids in `_id` position are stored as BSON binary (subtype 4), so
    /// filters have to match that representation rather than the string one
    /// plain serde produces.
    #[inline]
    pub fn uuid_binary(id: Uuid) -> Bson {
        Bson::Binary(bson::Binary {
            subtype: BinarySubtype::Uuid,
            bytes: id.as_bytes().to_vec(),
        })
    }

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": uuid_binary(id) }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn by_id_matches_binary_uuid_ids() {
            let id = Uuid::new_v4();
            let filter = by_id(id);

            match filter.get("_id") {
                Some(Bson::Binary(bin)) => {
                    assert_eq!(bin.subtype, BinarySubtype::Uuid);
                    assert_eq!(bin.bytes, id.as_bytes().to_vec());
                }
                other => panic!("expected binary _id filter, got {:?}", other),
            }
        }
    }
}
