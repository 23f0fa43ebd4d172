mod common;

use common::*;
use lilly::routes::crud::search_criterion;
use lilly::{col, AppError, Criterion, Options, Repository, Selection, SqlRepository};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;

fn opts() -> Options {
    Options::new()
}

fn ids(names: &[NameDto]) -> BTreeSet<i64> {
    names.iter().map(|n| n.id).collect()
}

fn roe_between_2_and_10() -> Selection<Criterion> {
    Selection::new()
        .criterion(col("id").lt(10))
        .criterion("id>2")
        .filter("title", "Roe")
}

#[tokio::test]
async fn get_one_returns_the_record_with_that_id() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    for expected in mock_names() {
        let got = repo.get_one(&json!(expected.id), &opts()).await.unwrap();
        assert_eq!(got, expected);
    }
}

#[tokio::test]
async fn get_one_missing_is_not_found() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let err = repo.get_one(&json!(99), &opts()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref m) if m == "record with id 99 not found"));
}

#[tokio::test]
async fn get_many_ands_criteria_and_filters_then_skips_and_limits() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let got = repo
        .get_many(&roe_between_2_and_10(), 1, Some(2), &opts())
        .await
        .unwrap();
    assert_eq!(got, vec![name(7, "Roe"), name(8, "Roe")]);
}

#[tokio::test]
async fn get_many_without_selection_returns_everything_in_key_order() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let got = repo.get_many(&Selection::new(), 0, None, &opts()).await.unwrap();
    assert_eq!(got, mock_names());
    let tail = repo.get_many(&Selection::new(), 8, None, &opts()).await.unwrap();
    assert_eq!(tail, vec![name(9, "Doe"), name(10, "Roe")]);
}

#[tokio::test]
async fn search_criterion_matches_substrings_and_binds_quotes_safely() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let fields = vec!["title".to_string()];
    let roes = repo
        .get_many(&Selection::new().criterion(search_criterion(&fields, "R")), 0, None, &opts())
        .await
        .unwrap();
    assert_eq!(ids(&roes), BTreeSet::from([2, 4, 7, 8, 10]));
    let none = repo
        .get_many(&Selection::new().criterion(search_criterion(&fields, "o'; DROP TABLE names; --")), 0, None, &opts())
        .await
        .unwrap();
    assert!(none.is_empty());
    assert_eq!(stored_names(&ds).await.len(), 10);
}

#[tokio::test]
async fn create_one_then_get_one_round_trips() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let created = repo
        .create_one(&NameCreate { title: "Moe".into() }, &opts())
        .await
        .unwrap();
    assert_eq!(created, name(11, "Moe"));
    let fetched = repo.get_one(&json!(created.id), &opts()).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn create_many_returns_full_dtos_with_generated_ids() {
    let ds = memory_datasource();
    let repo = names_repository(&ds);
    let input: Vec<NameCreate> = MOCK_NAME_RECORDS
        .iter()
        .map(|(_, t)| NameCreate { title: t.to_string() })
        .collect();
    let created = repo.create_many(&input, &opts()).await.unwrap();
    assert_eq!(created, mock_names());
    assert_eq!(stored_names(&ds).await, mock_names());
}

#[tokio::test]
async fn create_many_is_all_or_nothing() {
    let ds = memory_datasource();
    let repo = names_repository(&ds);
    let input = vec![json!({"title": "Doe"}), json!({"title": null})];
    let err = repo.create_many(&input, &opts()).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(stored_names(&ds).await.is_empty());
}

#[tokio::test]
async fn create_one_validates_against_the_model() {
    let ds = memory_datasource();
    let repo = names_repository(&ds);
    let err = repo.create_one(&json!({}), &opts()).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ref m) if m == "title is required"));
    let err = repo
        .create_one(&json!({"title": "Doe", "nickname": "D"}), &opts())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn update_one_overwrites_present_fields() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let patch = NamePatch { title: Some("Rene".into()) };
    let updated = repo.update_one(&json!(2), &patch, &opts()).await.unwrap();
    assert_eq!(updated, name(2, "Rene"));
    assert_eq!(repo.get_one(&json!(2), &opts()).await.unwrap(), name(2, "Rene"));

    let unchanged = repo.update_one(&json!(3), &NamePatch::default(), &opts()).await.unwrap();
    assert_eq!(unchanged, name(3, "Doe"));
}

#[tokio::test]
async fn update_one_never_changes_the_key() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let updated = repo
        .update_one(&json!(3), &name(100, "Rene"), &opts())
        .await
        .unwrap();
    assert_eq!(updated, name(3, "Rene"));
    assert!(matches!(
        repo.get_one(&json!(100), &opts()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_one_missing_is_not_found() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let patch = NamePatch { title: Some("Rene".into()) };
    let err = repo.update_one(&json!(99), &patch, &opts()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = repo.update_one(&json!(99), &NamePatch::default(), &opts()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn update_many_returns_the_snapshot_with_new_values_merged() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let patch = NamePatch { title: Some("Rene".into()) };
    let updated = repo
        .update_many(&patch, &roe_between_2_and_10(), &opts())
        .await
        .unwrap();
    assert_eq!(updated, vec![name(4, "Rene"), name(7, "Rene"), name(8, "Rene")]);

    let expected: Vec<NameDto> = mock_names()
        .into_iter()
        .map(|n| if [4, 7, 8].contains(&n.id) { name(n.id, "Rene") } else { n })
        .collect();
    assert_eq!(stored_names(&ds).await, expected);
}

#[tokio::test]
async fn update_many_with_nothing_to_set_changes_nothing() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let got = repo
        .update_many(&NamePatch::default(), &roe_between_2_and_10(), &opts())
        .await
        .unwrap();
    assert_eq!(ids(&got), BTreeSet::from([4, 7, 8]));
    assert_eq!(stored_names(&ds).await, mock_names());
}

#[tokio::test]
async fn remove_one_returns_the_deleted_record() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let removed = repo.remove_one(&json!(5), &opts()).await.unwrap();
    assert_eq!(removed, name(5, "Doe"));
    assert!(matches!(repo.get_one(&json!(5), &opts()).await, Err(AppError::NotFound(_))));
    assert!(matches!(repo.remove_one(&json!(5), &opts()).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn remove_many_returns_matches_as_they_were_before_deletion() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let removed = repo.remove_many(&roe_between_2_and_10(), &opts()).await.unwrap();
    assert_eq!(removed, vec![name(4, "Roe"), name(7, "Roe"), name(8, "Roe")]);

    let left = repo.get_many(&Selection::new(), 0, None, &opts()).await.unwrap();
    assert_eq!(left.len(), 7);
    assert!(ids(&left).is_disjoint(&ids(&removed)));
}

#[tokio::test]
async fn unknown_filter_field_is_rejected_not_ignored() {
    let ds = seeded_datasource().await;
    let repo = names_repository(&ds);
    let selection = Selection::new().filter("titel", "Roe");
    let err = repo.remove_many(&selection, &opts()).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(stored_names(&ds).await.len(), 10);
}

#[tokio::test]
async fn unregistered_model_is_a_contract_violation() {
    let ds = memory_datasource();
    let err = SqlRepository::<NameDto>::new(ds, "people").err().unwrap();
    assert!(matches!(err, AppError::NotImplemented(_)));
}

#[derive(Debug, Deserialize)]
struct WrongShape {
    #[allow(dead_code)]
    nickname: String,
}

#[tokio::test]
async fn output_dto_mismatch_is_a_defect() {
    let ds = seeded_datasource().await;
    let repo: SqlRepository<WrongShape> = SqlRepository::new(ds, "names").unwrap();
    let err = repo.get_one(&json!(1), &opts()).await.unwrap_err();
    assert!(matches!(err, AppError::Dto(_)));
}
