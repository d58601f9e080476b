use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::error::DomainError;

/// 蔵書1冊分のレコード。ISBNがカタログ内の一意キーになる。
///
/// `year` / `copies` は旧フォーマット（フォームUIが全フィールドを
/// 文字列で書き出していた）互換のため、数値と数値文字列の両方を受ける。
/// 書き出し時は常に数値。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub isbn: String,
    pub title: String,
    pub author: String,
    #[serde(deserialize_with = "de_year")]
    pub year: i32,
    #[serde(default = "default_copies", deserialize_with = "de_copies")]
    pub copies: u32,
}

/// 部分更新リクエスト。Noneのフィールドは変更しない。
/// 認識しないフィールドは型として存在しないので、渡しようがない。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    #[serde(default, deserialize_with = "de_opt_year")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "de_opt_copies")]
    pub copies: Option<u32>,
}

/// カタログ — 集約ルート。ISBN→Bookのマップを所有し、
/// 重複・空キーの不変条件はここで守る。
///
/// 反復順はキー昇順（BTreeMap）。`list` とCSVエクスポートの行順も同じ。
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    books: BTreeMap<String, Book>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn get(&self, isbn: &str) -> Option<&Book> {
        self.books.get(isbn)
    }

    /// 追加。空ISBNと重複ISBNは拒否する。
    pub fn add(&mut self, book: Book) -> Result<(), DomainError> {
        if book.isbn.trim().is_empty() {
            return Err(DomainError::EmptyIsbn);
        }
        if self.books.contains_key(&book.isbn) {
            return Err(DomainError::DuplicateIsbn(book.isbn));
        }
        self.books.insert(book.isbn.clone(), book);
        Ok(())
    }

    /// 部分更新。patchでSomeのフィールドだけ適用する。
    pub fn update(&mut self, isbn: &str, patch: BookPatch) -> Result<(), DomainError> {
        let book = self
            .books
            .get_mut(isbn)
            .ok_or_else(|| DomainError::BookNotFound(isbn.to_string()))?;

        if let Some(title) = patch.title {
            book.title = title;
        }
        if let Some(author) = patch.author {
            book.author = author;
        }
        if let Some(year) = patch.year {
            book.year = year;
        }
        if let Some(copies) = patch.copies {
            book.copies = copies;
        }

        Ok(())
    }

    /// 削除。削除したレコードを返す。
    pub fn remove(&mut self, isbn: &str) -> Result<Book, DomainError> {
        self.books
            .remove(isbn)
            .ok_or_else(|| DomainError::BookNotFound(isbn.to_string()))
    }

    /// ISBN・タイトル・著者に対するcase-insensitiveな部分一致検索（OR）。
    /// 空クエリは「全件一致」。
    pub fn search(&self, query: &str) -> Vec<&Book> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return self.list();
        }
        self.books
            .values()
            .filter(|b| {
                b.isbn.to_lowercase().contains(&q)
                    || b.title.to_lowercase().contains(&q)
                    || b.author.to_lowercase().contains(&q)
            })
            .collect()
    }

    /// 全レコードをキー昇順で返す。
    pub fn list(&self) -> Vec<&Book> {
        self.books.values().collect()
    }

    /// ロード時の正規化専用。キー衝突は後勝ち（旧list形式の動作に合わせる）。
    /// 呼び出し側が空ISBNを除外していることが前提。
    pub(crate) fn upsert(&mut self, book: Book) {
        self.books.insert(book.isbn.clone(), book);
    }
}

fn default_copies() -> u32 {
    1
}

/// 数値 or 数値文字列 → 整数。
#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

impl IntOrString {
    fn into_i64<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            IntOrString::Int(n) => Ok(n),
            IntOrString::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| E::custom(format!("not a number: {s:?}"))),
        }
    }
}

pub(crate) fn de_year<'de, D: Deserializer<'de>>(de: D) -> Result<i32, D::Error> {
    let n = IntOrString::deserialize(de)?.into_i64()?;
    i32::try_from(n).map_err(serde::de::Error::custom)
}

pub(crate) fn de_copies<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    let n = IntOrString::deserialize(de)?.into_i64()?;
    u32::try_from(n).map_err(serde::de::Error::custom)
}

pub(crate) fn de_opt_year<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i32>, D::Error> {
    Option::<IntOrString>::deserialize(de)?
        .map(|v| {
            let n = v.into_i64()?;
            i32::try_from(n).map_err(serde::de::Error::custom)
        })
        .transpose()
}

pub(crate) fn de_opt_copies<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u32>, D::Error> {
    Option::<IntOrString>::deserialize(de)?
        .map(|v| {
            let n = v.into_i64()?;
            u32::try_from(n).map_err(serde::de::Error::custom)
        })
        .transpose()
}
