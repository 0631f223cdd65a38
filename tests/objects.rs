use crate::common::command::{init_repository_dir, repository_dir, run_kit_command};
use crate::common::file::{FileSpec, write_file};
use crate::common::{HELLO_BLOB_OID, stdout_of};
use assert_fs::TempDir;
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

mod common;

#[fixture]
fn empty_repository(repository_dir: TempDir) -> TempDir {
    run_kit_command(repository_dir.path(), &["init"])
        .assert()
        .success();
    repository_dir
}

#[rstest]
fn hash_object_prints_id_without_writing(empty_repository: TempDir) {
    let dir = empty_repository.path();
    write_file(FileSpec::new(dir.join("hello.txt"), "hello".to_string()));

    run_kit_command(dir, &["hash-object", "hello.txt"])
        .assert()
        .success()
        .stdout(format!("{HELLO_BLOB_OID}\n"));

    assert!(!dir.join(".git/objects/b6").exists());
}

#[rstest]
fn written_blob_can_be_printed_back(empty_repository: TempDir) {
    let dir = empty_repository.path();
    write_file(FileSpec::new(dir.join("hello.txt"), "hello".to_string()));

    run_kit_command(dir, &["hash-object", "-w", "hello.txt"])
        .assert()
        .success()
        .stdout(format!("{HELLO_BLOB_OID}\n"));

    assert!(
        dir.join(".git/objects/b6/fc4c620b67d95f953a5c1c1230aaab5db5a1b0")
            .is_file()
    );
    run_kit_command(dir, &["cat-file", "-p", HELLO_BLOB_OID])
        .assert()
        .success()
        .stdout("hello");
}

#[rstest]
fn cat_file_of_missing_object_fails(empty_repository: TempDir) {
    run_kit_command(
        empty_repository.path(),
        &["cat-file", "-p", "0123456789012345678901234567890123456789"],
    )
    .assert()
    .failure()
    .stderr(predicate::str::contains("not found"));
}

#[rstest]
fn corrupt_object_is_reported_as_malformed(empty_repository: TempDir) {
    let dir = empty_repository.path();
    let object_path = dir.join(".git/objects/b6/fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
    std::fs::create_dir_all(object_path.parent().unwrap()).unwrap();
    std::fs::write(&object_path, b"definitely not zlib").unwrap();

    run_kit_command(dir, &["cat-file", "-p", HELLO_BLOB_OID])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed object"));
}

#[rstest]
fn ls_tree_lists_one_level_of_head(init_repository_dir: TempDir) {
    let assert = run_kit_command(init_repository_dir.path(), &["ls-tree", "HEAD"])
        .assert()
        .success();

    assert_eq!(
        stdout_of(&assert),
        "100644 blob 43dd47ea691c90a5fa7827892c70241913351963\t1.txt\n\
         040000 tree 202bc192d34beb85d0301ec8c8940cd0252cc48a\ta\n"
    );
}

#[rstest]
fn ls_tree_names_only(init_repository_dir: TempDir) {
    run_kit_command(
        init_repository_dir.path(),
        &[
            "ls-tree",
            "--name-only",
            "202bc192d34beb85d0301ec8c8940cd0252cc48a",
        ],
    )
    .assert()
    .success()
    .stdout("2.txt\nb\n");
}

#[rstest]
fn cat_file_pretty_prints_trees(init_repository_dir: TempDir) {
    run_kit_command(
        init_repository_dir.path(),
        &["cat-file", "-p", "d864f7793fd2952c217c27d3780442f8943c8663"],
    )
    .assert()
    .success()
    .stdout(predicate::str::starts_with(
        "100644 blob 1d19714ffbc272ba0da6eb419d66123c20527174\t3.txt",
    ));
}
