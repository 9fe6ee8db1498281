//! Outbound WhatsApp share message construction. Pure string and URL
//! building; opening the share target belongs to the presentation
//! layer.

use anyhow::Result;
use shared::domain::{ProductId, ProductRecord};
use url::Url;

use crate::money::format_brl_currency;

const WHATSAPP_SHARE_ENDPOINT: &str = "https://wa.me/";

/// Deep link to a single product page.
pub fn product_link(base_url: &str, id: ProductId) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), id.0)
}

/// The prefilled share text: name, formatted price, optional
/// description, and the product deep link.
pub fn share_message(product: &ProductRecord, base_url: &str) -> String {
    let mut message = format!(
        "\u{1f6cd}\u{fe0f} *{}*\n\n\u{1f4b0} *{}*\n\n",
        product.name,
        format_brl_currency(product.price)
    );

    if let Some(description) = product
        .description
        .as_deref()
        .filter(|description| !description.trim().is_empty())
    {
        message.push_str(&format!("\u{1f4dd} {description}\n\n"));
    }

    message.push_str(&format!(
        "\u{1f517} *Veja mais detalhes:*\n{}\n\n\u{2728} _Produto dispon\u{ed}vel agora!_",
        product_link(base_url, product.id)
    ));

    message
}

/// The share target URL with the message carried URL-encoded in the
/// `text` query parameter.
pub fn whatsapp_share_url(product: &ProductRecord, base_url: &str) -> Result<Url> {
    let url = Url::parse_with_params(
        WHATSAPP_SHARE_ENDPOINT,
        [("text", share_message(product, base_url))],
    )?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use shared::domain::OwnerId;

    use super::*;

    fn product(description: Option<&str>) -> ProductRecord {
        ProductRecord {
            id: ProductId(42),
            name: "Azul Shirt".into(),
            description: description.map(Into::into),
            price: 1234.5,
            image_url: None,
            owner_id: OwnerId::new("u1"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn message_carries_name_price_and_link() {
        let message = share_message(&product(Some("100% cotton")), "https://shop.example/produto/");
        assert!(message.contains("*Azul Shirt*"));
        assert!(message.contains("R$ 1.234,50"));
        assert!(message.contains("100% cotton"));
        assert!(message.contains("https://shop.example/produto/42"));
    }

    #[test]
    fn empty_description_is_omitted() {
        let message = share_message(&product(Some("  ")), "https://shop.example/produto");
        assert!(!message.contains("\u{1f4dd}"));
    }

    #[test]
    fn share_url_encodes_the_message() {
        let url = whatsapp_share_url(&product(None), "https://shop.example/produto").expect("url");
        assert_eq!(url.host_str(), Some("wa.me"));
        let text = url
            .query_pairs()
            .find(|(key, _)| key == "text")
            .map(|(_, value)| value.into_owned())
            .expect("text param");
        assert!(text.contains("Azul Shirt"));
        assert!(url.as_str().contains("text="));
        assert!(!url.as_str().contains('\n'));
    }
}
