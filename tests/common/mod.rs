//! Shared test harness for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;

use bookshelf::application::service::CatalogService;
use bookshelf::domain::model::book::{Book, Catalog};
use bookshelf::domain::repository::CatalogRepository;

// =============================================================================
// InMemoryRepo — テスト用リポジトリ
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[error("in-memory store error")]
pub struct InMemoryError;

/// ファイルI/O不要のインメモリリポジトリ。
pub struct InMemoryRepo {
    store: RefCell<Catalog>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            store: RefCell::new(Catalog::new()),
        }
    }
}

impl CatalogRepository for InMemoryRepo {
    type Error = InMemoryError;

    fn load(&self) -> Result<Catalog, Self::Error> {
        Ok(self.store.borrow().clone())
    }

    fn save(&self, catalog: &Catalog) -> Result<(), Self::Error> {
        *self.store.borrow_mut() = catalog.clone();
        Ok(())
    }
}

/// 常に失敗するリポジトリ。ストレージ障害の伝播テスト用。
pub struct FailingRepo;

impl CatalogRepository for FailingRepo {
    type Error = InMemoryError;

    fn load(&self) -> Result<Catalog, Self::Error> {
        Err(InMemoryError)
    }

    fn save(&self, _catalog: &Catalog) -> Result<(), Self::Error> {
        Err(InMemoryError)
    }
}

// =============================================================================
// Seeded catalog helpers
// =============================================================================

pub fn book(isbn: &str, title: &str, author: &str, year: i32, copies: u32) -> Book {
    Book {
        isbn: isbn.into(),
        title: title.into(),
        author: author.into(),
        year,
        copies,
    }
}

/// 標準のテスト用カタログ。キー昇順で
/// Go本 → アルゴリズム本 → Rust本 の順に並ぶ。
pub fn standard_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .add(book(
            "978-0134190440",
            "The Go Programming Language",
            "Alan Donovan",
            2015,
            2,
        ))
        .unwrap();
    catalog
        .add(book(
            "978-0262033848",
            "Introduction to Algorithms",
            "Thomas Cormen",
            2009,
            3,
        ))
        .unwrap();
    catalog
        .add(book(
            "978-1593278281",
            "The Rust Programming Language",
            "Steve Klabnik",
            2019,
            1,
        ))
        .unwrap();
    catalog
}

/// InMemoryRepoにカタログを積んでServiceを返す。
pub fn service_with_catalog(catalog: &Catalog) -> CatalogService<InMemoryRepo> {
    let repo = InMemoryRepo::new();
    repo.save(catalog).unwrap();
    CatalogService::new(repo)
}

// =============================================================================
// Assertion helpers
// =============================================================================

/// 結果がErrで、メッセージに指定文字列を含むことをassert。
pub fn assert_error_contains<T: std::fmt::Debug>(
    result: Result<T, impl std::fmt::Display>,
    expected: &str,
) {
    match result {
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains(expected),
                "Expected error containing '{expected}', got: '{msg}'"
            );
        }
        Ok(v) => panic!("Expected error containing '{expected}', got Ok({v:?})"),
    }
}
