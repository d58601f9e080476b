use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::domain::model::book::{Book, Catalog};
use crate::domain::repository::CatalogRepository;

#[derive(Debug, thiserror::Error)]
pub enum JsonStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSONファイルによるCatalogRepository実装。
/// 1カタログ = 1 JSONファイル。
///
/// 読み取りは2つのファイル形状を受ける:
/// - 正準形: ISBN → レコードのオブジェクト
/// - 旧形式: レコードの配列（各要素が自分のisbnを持つ）
///
/// 書き出しは常に正準形。壊れたファイルは `<stem>.backup.json` に
/// 退避してから空で作り直す。どちらのフロントエンドも同じ方針になる。
pub struct JsonCatalogRepository {
    path: PathBuf,
}

impl JsonCatalogRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 壊れたファイルを退避する。退避自体の失敗はロードを止めない。
    fn back_up_corrupt_file(&self) {
        let backup = self.path.with_extension("backup.json");
        match std::fs::rename(&self.path, &backup) {
            Ok(()) => {
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    "catalog file is not valid JSON — backed it up and starting empty"
                );
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    %err,
                    "catalog file is not valid JSON and could not be backed up — starting empty"
                );
            }
        }
    }
}

impl CatalogRepository for JsonCatalogRepository {
    type Error = JsonStoreError;

    fn load(&self) -> Result<Catalog, Self::Error> {
        if !self.path.exists() {
            // 初回オープン。空の正準形ファイルを作ってから空カタログを返す。
            let empty = Catalog::new();
            self.save(&empty)?;
            return Ok(empty);
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Catalog::new());
        }

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(_) => {
                // 破損はロード失敗にしない。退避して空で続行する。
                self.back_up_corrupt_file();
                let empty = Catalog::new();
                self.save(&empty)?;
                return Ok(empty);
            }
        };

        Ok(normalize(value))
    }

    fn save(&self, catalog: &Catalog) -> Result<(), Self::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(catalog)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// トップレベル形状を一度だけ判別し、正準の内部表現に変換する。
///
/// - Object: キーがISBN。値が非オブジェクトのエントリは無視。
///   キーとエントリ内のisbnが食い違う場合はキーが正。
/// - Array: 旧形式。オブジェクトでない要素、isbnが無い/空の要素、
///   フィールドが解釈できない要素は黙って捨てる。重複ISBNは後勝ち。
/// - その他: 空カタログ。
fn normalize(value: Value) -> Catalog {
    let mut catalog = Catalog::new();

    match value {
        Value::Object(entries) => {
            for (isbn, entry) in entries {
                if isbn.trim().is_empty() {
                    continue;
                }
                let Value::Object(mut fields) = entry else {
                    continue;
                };
                fields.insert("isbn".to_string(), Value::String(isbn));
                if let Ok(book) = serde_json::from_value::<Book>(Value::Object(fields)) {
                    catalog.upsert(book);
                }
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                let Ok(book) = serde_json::from_value::<Book>(entry) else {
                    continue;
                };
                if book.isbn.trim().is_empty() {
                    continue;
                }
                catalog.upsert(book);
            }
        }
        _ => {}
    }

    catalog
}
