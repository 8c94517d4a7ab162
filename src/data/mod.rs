use bson::doc;
use mongodb::error::{ErrorKind, WriteError, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};

pub mod cart;
pub mod class;
pub mod enrolled;
pub mod payment;
pub mod user;

const DUPLICATE_KEY: i32 = 11000;

/// Generates an opaque document id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub mod filter {
    use bson::{doc, Document};

    #[inline]
    pub fn by_id(id: impl AsRef<str>) -> Document {
        doc! { "_id": id.as_ref() }
    }

    #[inline]
    pub fn by_email(email: impl AsRef<str>) -> Document {
        doc! { "email": email.as_ref() }
    }

    #[inline]
    pub fn by_student(email: impl AsRef<str>) -> Document {
        doc! { "studentEmail": email.as_ref() }
    }

    #[inline]
    pub fn by_class_and_student(class_id: impl AsRef<str>, email: impl AsRef<str>) -> Document {
        doc! {
            "classId": class_id.as_ref(),
            "studentEmail": email.as_ref(),
        }
    }
}

/// Whether a write failed because a unique index already holds the key.
pub fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError {
            code: DUPLICATE_KEY,
            ..
        }))
    )
}

fn unique_index(keys: bson::Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(name.to_string())
                .build(),
        )
        .build()
}

/// Creates the unique indexes duplicate prevention relies on.
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    tracing::info!("Ensuring unique indexes...");

    db.collection::<bson::Document>(user::USER_COLLECTION_NAME)
        .create_index(unique_index(doc! { "email": 1 }, "unique_email"), None)
        .await?;

    let pair = doc! { "classId": 1, "studentEmail": 1 };
    db.collection::<bson::Document>(cart::CART_COLLECTION_NAME)
        .create_index(unique_index(pair.clone(), "unique_class_student"), None)
        .await?;
    db.collection::<bson::Document>(enrolled::ENROLLED_COLLECTION_NAME)
        .create_index(unique_index(pair, "unique_class_student"), None)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_strings() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn pair_filter_uses_stored_field_names() {
        let f = filter::by_class_and_student("c1", "s@x.com");
        assert_eq!(f.get_str("classId").unwrap(), "c1");
        assert_eq!(f.get_str("studentEmail").unwrap(), "s@x.com");
    }
}
