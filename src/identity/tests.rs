use super::{Direction, IdentityTranslator, MemoryMappingStore};
use crate::tests::fixtures;
use crate::utils::error::TranslateError;

#[tokio::test]
async fn test_to_elixir_id() {
    let translator = fixtures::translator();

    assert_eq!(
        translator.to_elixir_id("alice@ega.org").await.unwrap(),
        "alice@elixir.org"
    );
    assert_eq!(
        translator.to_elixir_id("carol@ega.org").await.unwrap(),
        "carol@elixir.org"
    );
}

#[tokio::test]
async fn test_to_ega_id() {
    let translator = fixtures::translator();

    assert_eq!(
        translator.to_ega_id("alice@elixir.org").await.unwrap(),
        "alice@ega.org"
    );
    assert_eq!(
        translator.to_ega_id("carol@elixir.org").await.unwrap(),
        "carol@ega.org"
    );
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let translator = fixtures::translator();

    for direction in [Direction::CegaToLega, Direction::LegaToCega] {
        let err = translator
            .translate("not_a_real_user", direction)
            .await
            .unwrap_err();
        match err {
            TranslateError::NotFound { id } => assert_eq!(id, "not_a_real_user"),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_lookup_is_keyed_by_the_opposite_column() {
    let translator = fixtures::translator();

    // An Elixir id is not an EGA id.
    assert!(translator.to_elixir_id("alice@elixir.org").await.is_err());
    assert!(translator.to_ega_id("alice@ega.org").await.is_err());
}

#[tokio::test]
async fn test_translate_follows_direction() {
    let translator = IdentityTranslator::new(MemoryMappingStore::from_pairs([(
        "dave@ega.org",
        "dave@elixir.org",
    )]));

    assert_eq!(
        translator
            .translate("dave@ega.org", Direction::CegaToLega)
            .await
            .unwrap(),
        "dave@elixir.org"
    );
    assert_eq!(
        translator
            .translate("dave@elixir.org", Direction::LegaToCega)
            .await
            .unwrap(),
        "dave@ega.org"
    );
}

#[test]
fn test_direction_display() {
    assert_eq!(Direction::CegaToLega.to_string(), "CEGA to LEGA");
    assert_eq!(Direction::LegaToCega.to_string(), "LEGA to CEGA");
}
