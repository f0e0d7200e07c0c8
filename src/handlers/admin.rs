use teloxide::prelude::*;

use crate::db::models::{Medicine, Sale};
use crate::services::Pharmacy;
use crate::utils::{format_price, format_timestamp};
use crate::Error;

const NOT_ADMIN: &str = "This command is only available to administrators.";

/// Parses `<name>; <description>; <price>; <stock>; <category>[; <image url>]`.
pub fn parse_medicine(payload: &str) -> Result<Medicine, String> {
    let fields: Vec<&str> = payload.split(';').map(str::trim).collect();
    if !(5..=6).contains(&fields.len()) {
        return Err(
            "Expected: <name>; <description>; <price>; <stock>; <category>[; <image url>]"
                .to_string(),
        );
    }
    if fields[0].is_empty() {
        return Err("Name must not be empty".to_string());
    }

    let price: f64 = fields[2]
        .parse()
        .map_err(|_| format!("Invalid price: {}", fields[2]))?;
    if !price.is_finite() || price < 0.0 {
        return Err("Price must be zero or more".to_string());
    }
    let stock: i32 = fields[3]
        .parse()
        .map_err(|_| format!("Invalid stock: {}", fields[3]))?;
    if stock < 0 {
        return Err("Stock must be zero or more".to_string());
    }

    let mut medicine = Medicine::new(fields[0], fields[1], price, stock, fields[4]);
    if let Some(url) = fields.get(5).filter(|url| !url.is_empty()) {
        medicine = medicine.with_image_url(*url);
    }
    Ok(medicine)
}

pub async fn new_medicine(
    bot: &Bot,
    msg: &Message,
    pharmacy: &Pharmacy,
    args: &str,
) -> Result<(), Error> {
    if !pharmacy.is_admin() {
        bot.send_message(msg.chat.id, NOT_ADMIN).await?;
        return Ok(());
    }

    let text = match parse_medicine(args) {
        Ok(medicine) => match pharmacy.add_medicine(medicine).await {
            Ok(added) => format!("Added {} with id {}", added.name, added.id),
            Err(e) => {
                log::error!("Failed to add medicine: {}", e);
                "Failed to add medicine".to_string()
            }
        },
        Err(usage) => usage,
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn edit_medicine(
    bot: &Bot,
    msg: &Message,
    pharmacy: &Pharmacy,
    args: &str,
) -> Result<(), Error> {
    if !pharmacy.is_admin() {
        bot.send_message(msg.chat.id, NOT_ADMIN).await?;
        return Ok(());
    }

    let (id, rest) = args.split_once(';').unwrap_or((args, ""));
    let id = id.trim();
    if pharmacy.get_medicine_by_id(id).is_none() {
        bot.send_message(msg.chat.id, "Medicine not found").await?;
        return Ok(());
    }

    let text = match parse_medicine(rest) {
        Ok(medicine) => {
            let medicine = medicine.with_id(id);
            match pharmacy.update_medicine(&medicine).await {
                Ok(()) => format!("Updated {}", medicine.name),
                Err(e) => {
                    log::error!("Failed to update medicine {}: {}", id, e);
                    "Failed to update medicine".to_string()
                }
            }
        }
        Err(usage) => usage,
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn delete_medicine(
    bot: &Bot,
    msg: &Message,
    pharmacy: &Pharmacy,
    id: &str,
) -> Result<(), Error> {
    if !pharmacy.is_admin() {
        bot.send_message(msg.chat.id, NOT_ADMIN).await?;
        return Ok(());
    }

    let Some(medicine) = pharmacy.get_medicine_by_id(id) else {
        bot.send_message(msg.chat.id, "Medicine not found").await?;
        return Ok(());
    };

    let text = match pharmacy.delete_medicine(id).await {
        Ok(()) => format!("Deleted {}", medicine.name),
        Err(e) => {
            log::error!("Failed to delete medicine {}: {}", id, e);
            "Failed to delete medicine".to_string()
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn list_sales(
    bot: &Bot,
    msg: &Message,
    pharmacy: &Pharmacy,
    medicine_id: &str,
) -> Result<(), Error> {
    if !pharmacy.is_admin() {
        bot.send_message(msg.chat.id, NOT_ADMIN).await?;
        return Ok(());
    }

    let sales = if medicine_id.is_empty() {
        pharmacy.sales()
    } else {
        pharmacy.sales_for_medicine(medicine_id)
    };
    let text = render_sales(&sales, |id| pharmacy.get_medicine_by_id(id));
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn low_stock(
    bot: &Bot,
    msg: &Message,
    pharmacy: &Pharmacy,
    threshold: &str,
    default_threshold: i32,
) -> Result<(), Error> {
    if !pharmacy.is_admin() {
        bot.send_message(msg.chat.id, NOT_ADMIN).await?;
        return Ok(());
    }

    let threshold = threshold.parse().unwrap_or(default_threshold);
    let medicines = pharmacy.low_stock(threshold);
    let text = if medicines.is_empty() {
        format!("No medicines at or below {} units.", threshold)
    } else {
        medicines
            .iter()
            .map(|m| format!("⚠️ {}: {} left ({})", m.name, m.stock, m.id))
            .collect::<Vec<_>>()
            .join("\n")
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Renders sales newest first; `lookup` resolves medicine names for display.
pub fn render_sales(sales: &[Sale], lookup: impl Fn(&str) -> Option<Medicine>) -> String {
    if sales.is_empty() {
        return "No sales recorded yet.".to_string();
    }

    let mut total = 0.0;
    let mut lines = Vec::with_capacity(sales.len());
    for sale in sales.iter().rev() {
        let (name, amount) = match lookup(&sale.medicine_id) {
            Some(medicine) => (medicine.name, medicine.price * f64::from(sale.quantity)),
            None => (format!("Unknown medicine ({})", sale.medicine_id), 0.0),
        };
        total += amount;
        lines.push(format!(
            "{} - {} x{} for {}, {}, {}",
            format_timestamp(sale.sold_at),
            name,
            sale.quantity,
            sale.buyer_name,
            sale.buyer_address,
            sale.buyer_phone
        ));
    }

    format!(
        "Sales ({}):\n\n{}\n\nEstimated revenue at current prices: {}",
        sales.len(),
        lines.join("\n"),
        format_price(total)
    )
}
