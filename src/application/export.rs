use std::path::{Path, PathBuf};

use crate::domain::model::book::Catalog;

use super::error::AppError;

/// カタログ → CSVファイルへの変換。
///
/// ヘッダ行は `ISBN,Title,Author,Year,Copies` 固定。
/// データ行は `Catalog::list` と同じ順。カンマや引用符を含む
/// フィールドのクォートはcsvクレートに任せる。
pub struct CsvExport;

impl CsvExport {
    const HEADER: [&'static str; 5] = ["ISBN", "Title", "Author", "Year", "Copies"];

    /// カタログをCSV文字列にする。
    pub fn render(catalog: &Catalog) -> Result<String, AppError> {
        let mut buf = Vec::new();
        {
            let mut writer = csv::Writer::from_writer(&mut buf);
            writer.write_record(Self::HEADER)?;
            for book in catalog.list() {
                let year = book.year.to_string();
                let copies = book.copies.to_string();
                writer.write_record([
                    book.isbn.as_str(),
                    book.title.as_str(),
                    book.author.as_str(),
                    year.as_str(),
                    copies.as_str(),
                ])?;
            }
            writer.flush().map_err(AppError::ExportIo)?;
        }
        Ok(String::from_utf8(buf).expect("csv writer emits UTF-8"))
    }

    /// ファイルに書き出す。親ディレクトリが無ければ作り、既存ファイルは上書き。
    pub fn export(catalog: &Catalog, path: &Path) -> Result<PathBuf, AppError> {
        let content = Self::render(catalog)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(AppError::ExportIo)?;
        }
        std::fs::write(path, content).map_err(AppError::ExportIo)?;
        Ok(path.to_path_buf())
    }
}
