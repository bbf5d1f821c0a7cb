//! Walrus publisher API types

use serde::{Deserialize, Serialize};

/// A blob accepted by a publisher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedBlob {
    pub blob_id: String,
    pub end_epoch: u64,
    /// Sui object id, only present for newly created blobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

/// Response from `PUT /v1/blobs`.
///
/// Exactly one of the two fields is set: the blob was either stored now or
/// had already been certified by an earlier upload of the same bytes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreResponse {
    pub newly_created: Option<NewlyCreated>,
    pub already_certified: Option<AlreadyCertified>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewlyCreated {
    pub blob_object: BlobObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobObject {
    pub id: String,
    pub blob_id: String,
    pub storage: BlobStorage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobStorage {
    pub end_epoch: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlreadyCertified {
    pub blob_id: String,
    pub end_epoch: u64,
}

impl StoreResponse {
    pub fn into_uploaded(self) -> Option<UploadedBlob> {
        if let Some(created) = self.newly_created {
            let object = created.blob_object;
            return Some(UploadedBlob {
                blob_id: object.blob_id,
                end_epoch: object.storage.end_epoch,
                object_id: Some(object.id),
            });
        }
        self.already_certified.map(|certified| UploadedBlob {
            blob_id: certified.blob_id,
            end_epoch: certified.end_epoch,
            object_id: None,
        })
    }
}
