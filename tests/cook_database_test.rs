//! Integration tests for the cook database
//!
//! Exercises freshness, persistence and dependency tracking through the
//! public API against a real content tree.

mod common;

use assetcook::content::{modified_time, set_modified_time, FilePath, FileType};
use assetcook::database::{CookDatabase, CookSource, CookVersions, Freshness, VersionTable};
use common::{TestProject, TestProjectBuilder, SECOND, T0};
use std::fs;

fn effect_project() -> TestProject {
    let project = TestProjectBuilder::new()
        .unwrap()
        .with_source("Fx/a.fx", "float4 main();")
        .with_source("Fx/shared.fxh", "float4 tint;")
        .build()
        .unwrap();
    project.touch_source("Fx/a.fx", T0).unwrap();
    project.touch_source("Fx/shared.fxh", T0).unwrap();
    project
}

/// Write the cooked output and commit it the way a task would
fn commit(database: &CookDatabase, project: &TestProject, output: &FilePath, sources: &[CookSource]) {
    let cooked = project.paths().cooked_path(output);
    fs::create_dir_all(cooked.parent().unwrap()).unwrap();
    fs::write(&cooked, "cooked").unwrap();
    let stamp = modified_time(&project.paths().source_path(output));
    set_modified_time(&cooked, stamp).unwrap();
    database.manual_on_file_change(output);
    database
        .update_metadata(output, modified_time(&cooked), sources)
        .unwrap();
}

#[test]
fn test_touch_recook_scenario() {
    let project = effect_project();
    let database = CookDatabase::new(project.paths(), CookVersions::current(), true);
    let a = FilePath::new("Fx/a", FileType::Effect);

    assert!(!database.check_up_to_date(&a));
    commit(&database, &project, &a, &[CookSource::file(a.clone())]);
    assert!(database.check_up_to_date(&a));
    assert_eq!(database.resolve_metadata(&a).sources[0].timestamp, T0);

    project.touch_source("Fx/a.fx", T0 + SECOND).unwrap();
    database.on_file_change(&a);
    assert!(!database.check_up_to_date(&a));

    commit(&database, &project, &a, &[CookSource::file(a.clone())]);
    assert_eq!(database.resolve_metadata(&a).sources[0].timestamp, T0 + SECOND);
    assert!(database.check_up_to_date(&a));
}

#[test]
fn test_record_survives_a_new_session() {
    let project = effect_project();
    let a = FilePath::new("Fx/a", FileType::Effect);
    let header = FilePath::new("Fx/shared", FileType::EffectHeader);
    {
        let database = CookDatabase::new(project.paths(), CookVersions::current(), true);
        commit(
            &database,
            &project,
            &a,
            &[CookSource::file(a.clone()), CookSource::file(header.clone())],
        );
    }

    let database = CookDatabase::new(project.paths(), CookVersions::current(), true);
    assert!(database.check_up_to_date(&a));
    // Resolving the record rebuilt the dependency index.
    assert_eq!(database.get_dependents(&header), vec![a.clone()]);

    project.touch_source("Fx/shared.fxh", T0 + SECOND).unwrap();
    database.on_file_change(&header);
    assert_eq!(
        database.check_up_to_date_with_details(&a),
        Freshness::Stale(vec![header])
    );
}

#[test]
fn test_idempotent_commit() {
    let project = effect_project();
    let database = CookDatabase::new(project.paths(), CookVersions::current(), true);
    let a = FilePath::new("Fx/a", FileType::Effect);
    let sources = [CookSource::file(a.clone())];

    commit(&database, &project, &a, &sources);
    commit(&database, &project, &a, &sources);
    assert!(database.check_up_to_date(&a));
}

#[test]
fn test_cooker_version_bump_is_global_staleness() {
    let project = effect_project();
    let a = FilePath::new("Fx/a", FileType::Effect);
    {
        let database = CookDatabase::new(project.paths(), CookVersions::current(), true);
        commit(&database, &project, &a, &[CookSource::file(a.clone())]);
    }

    let bumped = CookVersions::current().with_cooker_version(assetcook::content::COOKER_VERSION + 1);
    let database = CookDatabase::new(project.paths(), bumped, true);
    assert!(!database.check_up_to_date(&a));
    let freshness = database.check_up_to_date_with_details(&a);
    assert_eq!(freshness, Freshness::StaleGlobal);
    assert!(freshness.changed().is_empty());
}

#[test]
fn test_tampered_output_is_stale() {
    let project = effect_project();
    let database = CookDatabase::new(project.paths(), CookVersions::current(), true);
    let a = FilePath::new("Fx/a", FileType::Effect);
    commit(&database, &project, &a, &[CookSource::file(a.clone())]);

    set_modified_time(&project.paths().cooked_path(&a), T0 + 7 * SECOND).unwrap();
    database.manual_on_file_change(&a);
    assert_eq!(database.check_up_to_date_with_details(&a), Freshness::StaleGlobal);
}

#[test]
fn test_dropped_source_leaves_dependents() {
    let project = effect_project();
    let database = CookDatabase::new(project.paths(), CookVersions::current(), true);
    let a = FilePath::new("Fx/a", FileType::Effect);
    let header = FilePath::new("Fx/shared", FileType::EffectHeader);

    commit(
        &database,
        &project,
        &a,
        &[CookSource::file(a.clone()), CookSource::file(header.clone())],
    );
    assert_eq!(database.get_dependents(&header), vec![a.clone()]);

    commit(&database, &project, &a, &[CookSource::file(a.clone())]);
    assert!(database.get_dependents(&header).is_empty());
}

#[test]
fn test_directory_source_counts_files() {
    let project = TestProjectBuilder::new()
        .unwrap()
        .with_source("Code/Game.csproj", "<Project/>")
        .with_source("Code/Player.cs", "class Player {}")
        .build()
        .unwrap();
    let database = CookDatabase::new(project.paths(), CookVersions::current(), true);
    let game = FilePath::new("Code/Game", FileType::ScriptProject);
    let dir = FilePath::new("Code", FileType::Cs);

    commit(
        &database,
        &project,
        &game,
        &[CookSource::file(game.clone()), CookSource::directory(dir.clone())],
    );
    assert_eq!(database.resolve_metadata(&game).directory_sources[0].file_count, 1);

    project.write_source("Code/Sub/Enemy.cs", "class Enemy {}").unwrap();
    let added = FilePath::new("Code/Sub/Enemy", FileType::Cs);
    assert_eq!(database.get_dependents(&added), vec![game.clone()]);
    database.manual_on_file_change(&game);
    assert_eq!(
        database.check_up_to_date_with_details(&game),
        Freshness::Stale(vec![dir])
    );
}

#[test]
fn test_one_to_one_version_change_deletes_outputs() {
    let project = TestProjectBuilder::new()
        .unwrap()
        .with_source("Config/game.json", "{}")
        .with_source("Scripts/main.lua", "print()")
        .build()
        .unwrap();
    fs::create_dir_all(project.content("Config")).unwrap();
    fs::create_dir_all(project.content("Scripts")).unwrap();
    fs::write(project.content("Config/game.sjz"), "old").unwrap();
    fs::write(project.content("Scripts/main.lbc"), "old").unwrap();

    // First session records the versions.
    CookDatabase::new(project.paths(), CookVersions::current(), true);
    let json = FilePath::new("Config/game", FileType::Json);

    let bumped = CookVersions::current().with_data_version(FileType::Json, 99);
    let database = CookDatabase::new(project.paths(), bumped, true);
    assert!(!project.content_exists("Config/game.sjz"));
    assert!(project.content_exists("Scripts/main.lbc"));
    assert!(!database.check_up_to_date(&json));

    let table = VersionTable::load(&project.paths().version_data_path()).unwrap();
    assert_eq!(table.types[&FileType::Json].data, 99);
    assert!(table.types.contains_key(&FileType::Script));
    assert!(!table.types.contains_key(&FileType::Effect));
}
