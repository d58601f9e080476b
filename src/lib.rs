//! bookshelf — JSONファイル1枚を台帳とする個人蔵書カタログ。
//!
//! domain: Book / Catalog と永続化の抽象
//! application: ユースケース（CRUD, 検索, CSVエクスポート）
//! infra: JSONファイルリポジトリ
//! interface: CLIメニュー / ブラウザフォームUI

pub mod application;
pub mod domain;
pub mod infra;
pub mod interface;
