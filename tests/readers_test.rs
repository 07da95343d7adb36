mod common;

use anyhow::Result;
use common::{Shelf, test_service};
use library_ledger::application::AppError;
use library_ledger::domain::ReaderUpdate;

#[tokio::test]
async fn test_create_and_get_reader() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let reader = service
        .create_reader("Ana".to_string(), Some("555-0001".to_string()))
        .await?;

    let fetched = service.get_reader(reader.id).await?;
    assert_eq!(fetched.name, "Ana");
    assert_eq!(fetched.phone.as_deref(), Some("555-0001"));

    let without_phone = service.create_reader("Bruno".to_string(), None).await?;
    assert_eq!(service.get_reader(without_phone.id).await?.phone, None);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_reader_name_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service
        .create_reader("Ana".to_string(), Some("555-0001".to_string()))
        .await?;

    let err = service
        .create_reader("Ana".to_string(), Some("555-9999".to_string()))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    assert_eq!(service.list_readers().await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_phone_numbers_may_repeat() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service
        .create_reader("Ana".to_string(), Some("555-0001".to_string()))
        .await?;
    service
        .create_reader("Bruno".to_string(), Some("555-0001".to_string()))
        .await?;

    assert_eq!(service.list_readers().await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_get_missing_reader() -> Result<()> {
    let (service, _temp) = test_service().await?;

    assert!(matches!(
        service.get_reader(9).await,
        Err(AppError::ReaderNotFound(9))
    ));

    Ok(())
}

#[tokio::test]
async fn test_rename_to_taken_name_leaves_reader_unchanged() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let first = service
        .create_reader("Bia".to_string(), Some("555-0002".to_string()))
        .await?;
    let second = service
        .create_reader("Ana".to_string(), Some("555-0001".to_string()))
        .await?;

    let err = service
        .update_reader(first.id, ReaderUpdate::default().with_name("Ana"))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    let unchanged = service.get_reader(first.id).await?;
    assert_eq!(unchanged.name, "Bia");
    assert_eq!(unchanged.phone.as_deref(), Some("555-0002"));
    assert_eq!(service.get_reader(second.id).await?.name, "Ana");

    Ok(())
}

#[tokio::test]
async fn test_rename_to_own_name_is_allowed() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let shelf = Shelf::create(&service).await?;

    let reader = service
        .update_reader(
            shelf.ana.id,
            ReaderUpdate::default()
                .with_name("Ana")
                .with_phone("555-1234"),
        )
        .await?;

    assert_eq!(reader.name, "Ana");
    assert_eq!(reader.phone.as_deref(), Some("555-1234"));

    Ok(())
}

#[tokio::test]
async fn test_partial_reader_update() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let shelf = Shelf::create(&service).await?;

    service
        .update_reader(shelf.ana.id, ReaderUpdate::default().with_name("Ana Maria"))
        .await?;
    let reader = service.get_reader(shelf.ana.id).await?;
    assert_eq!(reader.name, "Ana Maria");
    assert_eq!(reader.phone.as_deref(), Some("555-0001"));

    service
        .update_reader(shelf.ana.id, ReaderUpdate::default().clear_phone())
        .await?;
    let reader = service.get_reader(shelf.ana.id).await?;
    assert_eq!(reader.name, "Ana Maria");
    assert_eq!(reader.phone, None);

    Ok(())
}

#[tokio::test]
async fn test_delete_reader_with_loan_conflicts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let shelf = Shelf::create(&service).await?;

    service.borrow(shelf.dune.id, shelf.ana.id).await?;

    let err = service.delete_reader(shelf.ana.id).await.unwrap_err();
    assert!(err.is_conflict());
    service.get_reader(shelf.ana.id).await?;

    // Readers without loans go away
    service.delete_reader(shelf.bruno.id).await?;
    assert!(matches!(
        service.get_reader(shelf.bruno.id).await,
        Err(AppError::ReaderNotFound(_))
    ));

    service.return_book(shelf.dune.id).await?;
    service.delete_reader(shelf.ana.id).await?;
    assert!(service.list_readers().await?.is_empty());

    Ok(())
}
