use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{OwnerId, ProductFields, ProductId, ProductRecord};

/// Row shape of the `loja_produto` collection as the record store
/// returns it. The schema is fixed; unknown columns are rejected here
/// rather than passed through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub nome: String,
    pub descricao: Option<String>,
    pub preco: f64,
    pub imagem: Option<String>,
    pub user_id: String,
}

impl From<ProductRow> for ProductRecord {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId(row.id),
            name: row.nome,
            description: row.descricao,
            price: row.preco,
            image_url: row.imagem,
            owner_id: OwnerId(row.user_id),
            created_at: row.created_at,
        }
    }
}

/// Insert/update payload for the `loja_produto` collection. `id` and
/// `created_at` are store-assigned and never sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpsertRow {
    pub nome: String,
    pub descricao: Option<String>,
    pub preco: f64,
    pub imagem: Option<String>,
    pub user_id: String,
}

impl From<&ProductFields> for ProductUpsertRow {
    fn from(fields: &ProductFields) -> Self {
        Self {
            nome: fields.name.clone(),
            descricao: fields.description.clone(),
            preco: fields.price,
            imagem: fields.image_url.clone(),
            user_id: fields.owner_id.0.clone(),
        }
    }
}

/// Identity payload returned by the auth provider for the current
/// session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUserResponse {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}
