use super::model::book::Catalog;

/// 永続化の抽象。Infra層が実装する。
///
/// ファイルが無い状態は「空のカタログ」と定義されるので、
/// loadはOptionではなくCatalogをそのまま返す。
pub trait CatalogRepository {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load(&self) -> Result<Catalog, Self::Error>;
    fn save(&self, catalog: &Catalog) -> Result<(), Self::Error>;
}
