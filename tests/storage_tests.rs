use campus_portal::storage::{
    ALLOWED_CONTENT_TYPES, MockStorageService, S3StorageClient, StorageService, upload_key,
};
use uuid::Uuid;

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = upload_key(Uuid::new_v4(), "scan.pdf");
        let url = mock
            .get_presigned_upload_url(&key, "application/pdf")
            .await
            .unwrap();

        assert!(url.contains("signature=fake"));
        assert!(url.contains(&key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        let result = mock.get_presigned_upload_url("uploads/x.pdf", "application/pdf").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_keys_are_unique_per_upload() {
        let owner = Uuid::new_v4();
        assert_ne!(upload_key(owner, "a.png"), upload_key(owner, "a.png"));
    }

    #[test]
    fn test_only_document_types_are_allowed() {
        assert!(ALLOWED_CONTENT_TYPES.contains(&"application/pdf"));
        assert!(!ALLOWED_CONTENT_TYPES.contains(&"text/html"));
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    /// Presigning is computed locally, so no storage server needs to be running.
    #[tokio::test]
    async fn test_s3_presigned_url_is_path_style() {
        let client = S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "admin",
            "password",
            "campus-test",
        )
        .await;

        let url = client
            .get_presigned_upload_url("uploads/card.pdf", "application/pdf")
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/campus-test/uploads/card.pdf"));
        assert!(url.contains("X-Amz-Expires=600"));
    }
}
