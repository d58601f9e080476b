use std::path::{Path, PathBuf};

use crate::domain::model::book::{Book, BookPatch, Catalog};
use crate::domain::repository::CatalogRepository;

use super::error::AppError;
use super::export::CsvExport;

/// カタログに対するユースケース。
/// すべての変更操作は load → mutate → save で、保存は毎回・即時。
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// 追加して永続化する。重複ISBNはエラーで、何も書かない。
    pub fn add_book(&self, book: Book) -> Result<(), AppError> {
        let mut catalog = self.load_catalog()?;
        catalog.add(book)?;
        self.persist(&catalog)
    }

    /// 部分更新して永続化する。
    pub fn update_book(&self, isbn: &str, patch: BookPatch) -> Result<(), AppError> {
        let mut catalog = self.load_catalog()?;
        catalog.update(isbn, patch)?;
        self.persist(&catalog)
    }

    /// 削除して永続化する。削除したレコードを返す。
    pub fn delete_book(&self, isbn: &str) -> Result<Book, AppError> {
        let mut catalog = self.load_catalog()?;
        let removed = catalog.remove(isbn)?;
        self.persist(&catalog)?;
        Ok(removed)
    }

    /// 1件取得。無ければNone。
    pub fn get_book(&self, isbn: &str) -> Result<Option<Book>, AppError> {
        Ok(self.load_catalog()?.get(isbn).cloned())
    }

    /// 検索。空クエリは全件。
    pub fn search(&self, query: &str) -> Result<Vec<Book>, AppError> {
        Ok(self
            .load_catalog()?
            .search(query)
            .into_iter()
            .cloned()
            .collect())
    }

    /// 全件をキー昇順で返す。
    pub fn list_books(&self) -> Result<Vec<Book>, AppError> {
        Ok(self
            .load_catalog()?
            .list()
            .into_iter()
            .cloned()
            .collect())
    }

    /// 現在の内容をCSVに書き出し、書いたパスを返す。
    pub fn export_csv(&self, path: &Path) -> Result<PathBuf, AppError> {
        let catalog = self.load_catalog()?;
        CsvExport::export(&catalog, path)
    }

    /// CSV文字列として返す（ブラウザUIのダウンロード用）。
    pub fn render_csv(&self) -> Result<String, AppError> {
        let catalog = self.load_catalog()?;
        CsvExport::render(&catalog)
    }

    // --- private ---

    fn load_catalog(&self) -> Result<Catalog, AppError> {
        self.repo
            .load()
            .map_err(|e| AppError::Storage(Box::new(e)))
    }

    fn persist(&self, catalog: &Catalog) -> Result<(), AppError> {
        self.repo
            .save(catalog)
            .map_err(|e| AppError::Storage(Box::new(e)))
    }
}
