use teloxide::prelude::*;

use crate::db::models::Buyer;
use crate::error::PharmacyError;
use crate::services::{Cart, Pharmacy, Receipt};
use crate::utils::{format_price, parse_fields};
use crate::Error;

pub async fn add_to_cart(
    bot: &Bot,
    msg: &Message,
    pharmacy: &mut Pharmacy,
    id: &str,
) -> Result<(), Error> {
    let Some(medicine) = pharmacy.get_medicine_by_id(id) else {
        bot.send_message(msg.chat.id, "Medicine not found").await?;
        return Ok(());
    };

    let in_cart = pharmacy
        .cart()
        .items()
        .iter()
        .filter(|m| m.id == medicine.id)
        .count();
    if in_cart >= usize::try_from(medicine.stock).unwrap_or(0) {
        bot.send_message(
            msg.chat.id,
            format!("Sorry, only {} of {} in stock.", medicine.stock, medicine.name),
        )
        .await?;
        return Ok(());
    }

    let name = medicine.name.clone();
    pharmacy.add_to_cart(medicine);
    bot.send_message(
        msg.chat.id,
        format!("Added {} to cart ({} item(s)).", name, pharmacy.cart().len()),
    )
    .await?;
    Ok(())
}

pub async fn remove_from_cart(
    bot: &Bot,
    msg: &Message,
    pharmacy: &mut Pharmacy,
    id: &str,
) -> Result<(), Error> {
    let text = match pharmacy.remove_from_cart(id) {
        Some(medicine) => format!("Removed {} from your cart.", medicine.name),
        None => "That medicine is not in your cart.".to_string(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn show_cart(bot: &Bot, msg: &Message, pharmacy: &Pharmacy) -> Result<(), Error> {
    bot.send_message(msg.chat.id, render_cart(pharmacy.cart()))
        .await?;
    Ok(())
}

/// Handles the process of placing an order for everything in the cart.
///
/// Expects `<name>; <address>; <phone>`. Payment is cash on delivery.
pub async fn checkout(
    bot: &Bot,
    msg: &Message,
    pharmacy: &mut Pharmacy,
    args: &str,
) -> Result<(), Error> {
    if !pharmacy.is_logged_in() {
        bot.send_message(msg.chat.id, "Please /login before placing an order.")
            .await?;
        return Ok(());
    }

    let Some(fields) = parse_fields(args, 3) else {
        bot.send_message(msg.chat.id, "Usage: /checkout <name>; <address>; <phone>")
            .await?;
        return Ok(());
    };
    let buyer = Buyer::new(&fields[0], &fields[1], &fields[2]);

    let text = match pharmacy.checkout(&buyer).await {
        Ok(receipt) => render_receipt(&receipt),
        Err(e @ (PharmacyError::EmptyCart | PharmacyError::IncompleteBuyer)) => e.to_string(),
        Err(e) => {
            log::error!("Checkout failed: {}", e);
            "Your order could not be completed. Anything still in your /cart was not ordered, please try again later.".to_string()
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub fn render_cart(cart: &Cart) -> String {
    if cart.is_empty() {
        return "Your cart is empty.".to_string();
    }

    let lines = cart
        .quantities()
        .iter()
        .map(|(medicine, quantity)| {
            format!(
                "• {} x{} - {}   /remove {}",
                medicine.name,
                quantity,
                format_price(medicine.price * f64::from(*quantity)),
                medicine.id
            )
        })
        .collect::<Vec<String>>()
        .join("\n");

    format!(
        "Your cart:\n\n{}\n\nTotal: {}\nPayment method: cash on delivery.\nUse /checkout <name>; <address>; <phone> to order.",
        lines,
        format_price(cart.total())
    )
}

pub fn render_receipt(receipt: &Receipt) -> String {
    let mut text = if receipt.sales.is_empty() {
        "No items could be ordered.".to_string()
    } else {
        format!(
            "Order placed successfully! {} item(s), total {}.",
            receipt.sales.len(),
            format_price(receipt.total)
        )
    };
    if !receipt.rejected.is_empty() {
        let names = receipt
            .rejected
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        text.push_str(&format!("\nNot enough stock for: {}", names));
    }
    text
}
