use teloxide::{prelude::*, types::ParseMode};

use crate::db::models::Medicine;
use crate::services::Pharmacy;
use crate::utils::{escape_markdown, format_price};
use crate::Error;

pub async fn list_catalog(
    bot: &Bot,
    msg: &Message,
    pharmacy: &Pharmacy,
    search: &str,
    category: Option<&str>,
) -> Result<(), Error> {
    log::info!("Listing catalog (search: {:?}, category: {:?})", search, category);
    let medicines = pharmacy.search(search, category);
    bot.send_message(msg.chat.id, render_catalog(&medicines))
        .await?;
    Ok(())
}

pub async fn list_categories(bot: &Bot, msg: &Message, pharmacy: &Pharmacy) -> Result<(), Error> {
    let categories = pharmacy.categories();
    let text = if categories.is_empty() {
        "No categories yet.".to_string()
    } else {
        format!(
            "Categories:\n\n{}\n\nUse /category <name> to browse one.",
            categories
                .iter()
                .map(|c| format!("• {}", c))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn show_medicine(
    bot: &Bot,
    msg: &Message,
    pharmacy: &Pharmacy,
    id: &str,
) -> Result<(), Error> {
    match pharmacy.get_medicine_by_id(id) {
        Some(medicine) => {
            bot.send_message(msg.chat.id, render_medicine(&medicine))
                .parse_mode(ParseMode::MarkdownV2)
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Medicine not found").await?;
        }
    }
    Ok(())
}

pub fn render_catalog(medicines: &[Medicine]) -> String {
    if medicines.is_empty() {
        return "No medicines found in the inventory".to_string();
    }

    let lines = medicines
        .iter()
        .map(|medicine| {
            let availability = if medicine.stock > 0 {
                format!("{} in stock", medicine.stock)
            } else {
                "out of stock".to_string()
            };
            format!(
                "🏥 {} - {}\n   {}\n   /add {}",
                medicine.name,
                format_price(medicine.price),
                availability,
                medicine.id
            )
        })
        .collect::<Vec<String>>()
        .join("\n\n");

    format!("Available medicines:\n\n{}", lines)
}

/// MarkdownV2 detail card for a single medicine.
pub fn render_medicine(medicine: &Medicine) -> String {
    let mut text = format!(
        "*{}*\n{}\n\n*Price:* {}\n*Stock:* {}\n*Category:* {}\n*Id:* `{}`",
        escape_markdown(&medicine.name),
        escape_markdown(&medicine.description),
        escape_markdown(&format_price(medicine.price)),
        medicine.stock,
        escape_markdown(if medicine.category.is_empty() {
            "-"
        } else {
            medicine.category.as_str()
        }),
        medicine.id.replace('\\', "\\\\").replace('`', "\\`"),
    );
    if let Some(url) = &medicine.image_url {
        text.push_str(&format!("\n[Image]({})", url.replace('\\', "\\\\").replace(')', "\\)")));
    }
    text
}
