//! CLIメニューフロントエンド。
//!
//! 番号付きメニューのループでカタログを操作する。ブラウザフォームUIと
//! 同じJSONファイルを読み書きする薄いラッパで、業務ルールはすべて
//! domain/application側にある。
//!
//! 入出力はジェネリックな `BufRead` / `Write` なので、テストからは
//! メモリ上のバッファでセッションごと駆動できる。

use std::io::{BufRead, Write};
use std::path::Path;

use crate::application::error::AppError;
use crate::application::service::CatalogService;
use crate::domain::error::DomainError;
use crate::domain::model::book::{Book, BookPatch};
use crate::domain::repository::CatalogRepository;

/// メニューループを回す。"8"（またはEOF）で抜ける。
///
/// 業務ルール違反はメッセージ表示して続行、ストレージ障害だけが
/// エラーとして呼び出し元へ戻る。
pub fn run<R, In, Out>(
    service: &CatalogService<R>,
    export_path: &Path,
    input: In,
    output: Out,
) -> anyhow::Result<()>
where
    R: CatalogRepository,
    In: BufRead,
    Out: Write,
{
    let mut console = Console { input, output };

    console.line("Welcome to the library catalog.")?;
    loop {
        console.menu()?;
        let Some(choice) = console.prompt("Choose an option: ")? else {
            return Ok(());
        };
        match choice.as_str() {
            "1" => add_book(service, &mut console)?,
            "2" => view_book(service, &mut console)?,
            "3" => update_book(service, &mut console)?,
            "4" => delete_book(service, &mut console)?,
            "5" => search_books(service, &mut console)?,
            "6" => list_books(service, &mut console)?,
            "7" => export_csv(service, export_path, &mut console)?,
            "8" => {
                console.line("Goodbye.")?;
                return Ok(());
            }
            _ => console.line("Invalid choice. Try again.")?,
        }
    }
}

/// 幅をデータに合わせたプレーンテキストの表を組む。
pub fn format_table(books: &[Book]) -> String {
    if books.is_empty() {
        return "No books to display.".to_string();
    }

    let headers = ["ISBN", "Title", "Author", "Year", "Copies"];
    let rows: Vec<[String; 5]> = books
        .iter()
        .map(|b| {
            [
                b.isbn.clone(),
                b.title.clone(),
                b.author.clone(),
                b.year.to_string(),
                b.copies.to_string(),
            ]
        })
        .collect();

    let widths: Vec<usize> = (0..headers.len())
        .map(|i| {
            rows.iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(headers[i].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{h:<width$}", width = widths[i]))
        .collect();
    out.push_str(&header_line.join(" | "));
    out.push('\n');

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&sep.join("-+-"));
    out.push('\n');

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
            .collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }

    out
}

// =============================================================================
// Menu actions
// =============================================================================

fn add_book<R, In, Out>(
    service: &CatalogService<R>,
    console: &mut Console<In, Out>,
) -> anyhow::Result<()>
where
    R: CatalogRepository,
    In: BufRead,
    Out: Write,
{
    let Some(isbn) = console.prompt("ISBN: ")? else {
        return Ok(());
    };
    let Some(title) = console.prompt("Title: ")? else {
        return Ok(());
    };
    let Some(author) = console.prompt("Author: ")? else {
        return Ok(());
    };
    let Some(year) = console.prompt("Year of publication: ")? else {
        return Ok(());
    };
    let Some(copies) = console.prompt("Copies (default 1): ")? else {
        return Ok(());
    };

    let Ok(year) = year.parse::<i32>() else {
        console.line("Year and copies must be numbers.")?;
        return Ok(());
    };
    let copies = if copies.is_empty() {
        1
    } else {
        match copies.parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                console.line("Year and copies must be numbers.")?;
                return Ok(());
            }
        }
    };

    let book = Book {
        isbn,
        title,
        author,
        year,
        copies,
    };
    finish(console, service.add_book(book), "Book added.")
}

fn view_book<R, In, Out>(
    service: &CatalogService<R>,
    console: &mut Console<In, Out>,
) -> anyhow::Result<()>
where
    R: CatalogRepository,
    In: BufRead,
    Out: Write,
{
    let Some(isbn) = console.prompt("Enter ISBN: ")? else {
        return Ok(());
    };
    match service.get_book(&isbn) {
        Ok(Some(book)) => console.line(&format_table(&[book]))?,
        Ok(None) => console.line("Book not found.")?,
        Err(fatal) => return Err(fatal.into()),
    }
    Ok(())
}

fn update_book<R, In, Out>(
    service: &CatalogService<R>,
    console: &mut Console<In, Out>,
) -> anyhow::Result<()>
where
    R: CatalogRepository,
    In: BufRead,
    Out: Write,
{
    let Some(isbn) = console.prompt("ISBN of book to update: ")? else {
        return Ok(());
    };

    console.line("Leave blank to keep current value.")?;
    let Some(title) = console.prompt("New Title: ")? else {
        return Ok(());
    };
    let Some(author) = console.prompt("New Author: ")? else {
        return Ok(());
    };
    let Some(year) = console.prompt("New Year: ")? else {
        return Ok(());
    };
    let Some(copies) = console.prompt("New Copies: ")? else {
        return Ok(());
    };

    let year = match parse_optional_number::<i32>(&year) {
        Ok(v) => v,
        Err(()) => {
            console.line("Year and copies must be numbers.")?;
            return Ok(());
        }
    };
    let copies = match parse_optional_number::<u32>(&copies) {
        Ok(v) => v,
        Err(()) => {
            console.line("Year and copies must be numbers.")?;
            return Ok(());
        }
    };

    let patch = BookPatch {
        title: (!title.is_empty()).then_some(title),
        author: (!author.is_empty()).then_some(author),
        year,
        copies,
    };

    finish(console, service.update_book(&isbn, patch), "Book updated.")
}

fn delete_book<R, In, Out>(
    service: &CatalogService<R>,
    console: &mut Console<In, Out>,
) -> anyhow::Result<()>
where
    R: CatalogRepository,
    In: BufRead,
    Out: Write,
{
    let Some(isbn) = console.prompt("ISBN to delete: ")? else {
        return Ok(());
    };
    let Some(confirm) =
        console.prompt(&format!("Are you sure you want to delete {isbn}? (y/n): "))?
    else {
        return Ok(());
    };
    if !confirm.eq_ignore_ascii_case("y") {
        return Ok(());
    }

    finish(console, service.delete_book(&isbn).map(|_| ()), "Deleted.")
}

fn search_books<R, In, Out>(
    service: &CatalogService<R>,
    console: &mut Console<In, Out>,
) -> anyhow::Result<()>
where
    R: CatalogRepository,
    In: BufRead,
    Out: Write,
{
    let Some(query) = console.prompt("Search query (title/author/isbn, blank for all): ")? else {
        return Ok(());
    };
    let results = service.search(&query)?;
    console.line(&format_table(&results))?;
    Ok(())
}

fn list_books<R, In, Out>(
    service: &CatalogService<R>,
    console: &mut Console<In, Out>,
) -> anyhow::Result<()>
where
    R: CatalogRepository,
    In: BufRead,
    Out: Write,
{
    let books = service.list_books()?;
    console.line(&format_table(&books))?;
    Ok(())
}

fn export_csv<R, In, Out>(
    service: &CatalogService<R>,
    export_path: &Path,
    console: &mut Console<In, Out>,
) -> anyhow::Result<()>
where
    R: CatalogRepository,
    In: BufRead,
    Out: Write,
{
    let written = service.export_csv(export_path)?;
    console.line(&format!("Exported to: {}", written.display()))?;
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

/// 空文字はNone、それ以外はパース。パース失敗はErr。
fn parse_optional_number<T: std::str::FromStr>(input: &str) -> Result<Option<T>, ()> {
    if input.is_empty() {
        return Ok(None);
    }
    input.parse::<T>().map(Some).map_err(|_| ())
}

/// 変更操作の結果をユーザ向けメッセージにする。
/// 業務ルール違反はメッセージ、それ以外（ストレージ障害）は致命扱い。
fn finish<In, Out>(
    console: &mut Console<In, Out>,
    result: Result<(), AppError>,
    ok_message: &str,
) -> anyhow::Result<()>
where
    In: BufRead,
    Out: Write,
{
    match result {
        Ok(()) => console.line(ok_message)?,
        Err(AppError::Domain(err)) => console.line(failure_message(&err))?,
        Err(fatal) => return Err(fatal.into()),
    }
    Ok(())
}

fn failure_message(err: &DomainError) -> &'static str {
    match err {
        DomainError::EmptyIsbn => "ISBN must not be empty.",
        DomainError::DuplicateIsbn(_) => "Book with this ISBN already exists.",
        DomainError::BookNotFound(_) => "Book not found.",
    }
}

struct Console<In, Out> {
    input: In,
    output: Out,
}

impl<In: BufRead, Out: Write> Console<In, Out> {
    fn menu(&mut self) -> std::io::Result<()> {
        self.line("")?;
        self.line("Library Catalog")?;
        self.line("1. Add book")?;
        self.line("2. View book (by ISBN)")?;
        self.line("3. Update book")?;
        self.line("4. Delete book")?;
        self.line("5. Search books")?;
        self.line("6. List all books")?;
        self.line("7. Export to CSV")?;
        self.line("8. Exit")
    }

    /// ラベルを出して1行読む。EOFはNone。前後の空白は落とす。
    fn prompt(&mut self, label: &str) -> std::io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn line(&mut self, text: &str) -> std::io::Result<()> {
        writeln!(self.output, "{text}")
    }
}
