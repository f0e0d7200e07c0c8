//! Telegram front end. Each chat gets its own [`Pharmacy`] session; the
//! handlers translate commands into calls on it and render the replies.

use std::collections::HashMap;
use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup, ReplyMarkup},
    utils::command::BotCommands,
};
use tokio::sync::Mutex;

use crate::backend::{AuthProvider, PharmacyStore};
use crate::services::Pharmacy;
use crate::Error;

pub mod admin;
pub mod auth;
pub mod inventory;
pub mod order;

pub const CATALOG_BUTTON: &str = "📋 Catalog";
pub const CART_BUTTON: &str = "🛒 Cart";
pub const HELP_BUTTON: &str = "❓ Help";

#[derive(BotCommands, Debug, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start interacting with the pharmacy.")]
    Start,
    #[command(description = "Display help information about available commands.")]
    Help,
    #[command(description = "Display the main menu.")]
    Menu,
    #[command(description = "Create an account: /signup <email> <password>")]
    Signup(String),
    #[command(description = "Log in: /login <email> <password>")]
    Login(String),
    #[command(description = "Log out and empty your cart.")]
    Logout,
    #[command(description = "Browse medicines, optionally by name: /catalog [name]")]
    Catalog(String),
    #[command(description = "List medicine categories.")]
    Categories,
    #[command(description = "Browse one category: /category <name>")]
    Category(String),
    #[command(description = "Show a medicine: /medicine <id>")]
    Medicine(String),
    #[command(description = "Add a medicine to your cart: /add <id>")]
    Add(String),
    #[command(description = "Remove a medicine from your cart: /remove <id>")]
    Remove(String),
    #[command(description = "Show your cart.")]
    Cart,
    #[command(description = "Empty your cart.")]
    ClearCart,
    #[command(description = "Place your order: /checkout <name>; <address>; <phone>")]
    Checkout(String),
    #[command(description = "Show your profile.")]
    Profile,
    #[command(description = "Update your profile: /setprofile <name>; <email>; <phone>")]
    SetProfile(String),
    #[command(
        description = "(admin) Add a medicine: /newmedicine <name>; <description>; <price>; <stock>; <category>[; <image url>]"
    )]
    NewMedicine(String),
    #[command(
        description = "(admin) Edit a medicine: /editmedicine <id>; <name>; <description>; <price>; <stock>; <category>[; <image url>]"
    )]
    EditMedicine(String),
    #[command(description = "(admin) Delete a medicine: /deletemedicine <id>")]
    DeleteMedicine(String),
    #[command(description = "(admin) Sales history, optionally for one medicine: /sales [id]")]
    Sales(String),
    #[command(description = "(admin) Medicines running low: /lowstock [threshold]")]
    LowStock(String),
}

/// Shared dependencies handed to every handler by the dispatcher.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn PharmacyStore>,
    auth: Arc<dyn AuthProvider>,
    sessions: Arc<Mutex<HashMap<ChatId, Arc<Mutex<Pharmacy>>>>>,
    pub low_stock_threshold: i32,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PharmacyStore>,
        auth: Arc<dyn AuthProvider>,
        low_stock_threshold: i32,
    ) -> Self {
        AppState {
            store,
            auth,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            low_stock_threshold,
        }
    }

    /// Returns the chat's session, creating an anonymous one on first contact.
    pub async fn session(&self, chat_id: ChatId) -> Arc<Mutex<Pharmacy>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(chat_id)
            .or_insert_with(|| {
                log::debug!("Opening session for chat {}", chat_id);
                Arc::new(Mutex::new(Pharmacy::new(
                    Arc::clone(&self.store),
                    Arc::clone(&self.auth),
                )))
            })
            .clone()
    }

    /// Forgets the chat's session; the next message opens a fresh anonymous one.
    pub async fn end_session(&self, chat_id: ChatId) -> bool {
        let removed = self.sessions.lock().await.remove(&chat_id).is_some();
        if removed {
            log::debug!("Closed session for chat {}", chat_id);
        }
        removed
    }
}

/// Handles bot commands and responds accordingly.
pub async fn answer(bot: Bot, msg: Message, cmd: Command, state: AppState) -> Result<(), Error> {
    log::info!("Received command {:?} in chat {}", cmd, msg.chat.id);
    let session = state.session(msg.chat.id).await;
    let mut pharmacy = session.lock().await;

    match cmd {
        Command::Start => {
            bot.send_message(
                msg.chat.id,
                "Welcome to Medex! Browse with /catalog, or /signup and /login to order.",
            )
            .reply_markup(main_menu())
            .await?;
        }
        Command::Help => send_help(&bot, &msg).await?,
        Command::Menu => {
            bot.send_message(msg.chat.id, "Please choose an option:")
                .reply_markup(main_menu())
                .await?;
        }
        Command::Signup(args) => auth::signup(&bot, &msg, &mut pharmacy, &args).await?,
        Command::Login(args) => auth::login(&bot, &msg, &mut pharmacy, &args).await?,
        Command::Logout => {
            auth::logout(&bot, &msg, &mut pharmacy).await?;
            state.end_session(msg.chat.id).await;
        }
        Command::Profile => auth::show_profile(&bot, &msg, &mut pharmacy).await?,
        Command::SetProfile(args) => auth::set_profile(&bot, &msg, &mut pharmacy, &args).await?,
        Command::Catalog(search) => {
            inventory::list_catalog(&bot, &msg, &pharmacy, &search, None).await?
        }
        Command::Categories => inventory::list_categories(&bot, &msg, &pharmacy).await?,
        Command::Category(category) => {
            inventory::list_catalog(&bot, &msg, &pharmacy, "", Some(category.trim())).await?
        }
        Command::Medicine(id) => inventory::show_medicine(&bot, &msg, &pharmacy, id.trim()).await?,
        Command::Add(id) => order::add_to_cart(&bot, &msg, &mut pharmacy, id.trim()).await?,
        Command::Remove(id) => order::remove_from_cart(&bot, &msg, &mut pharmacy, id.trim()).await?,
        Command::Cart => order::show_cart(&bot, &msg, &pharmacy).await?,
        Command::ClearCart => {
            pharmacy.clear_cart();
            bot.send_message(msg.chat.id, "Your cart is now empty.").await?;
        }
        Command::Checkout(args) => order::checkout(&bot, &msg, &mut pharmacy, &args).await?,
        Command::NewMedicine(args) => admin::new_medicine(&bot, &msg, &pharmacy, &args).await?,
        Command::EditMedicine(args) => admin::edit_medicine(&bot, &msg, &pharmacy, &args).await?,
        Command::DeleteMedicine(id) => {
            admin::delete_medicine(&bot, &msg, &pharmacy, id.trim()).await?
        }
        Command::Sales(id) => admin::list_sales(&bot, &msg, &pharmacy, id.trim()).await?,
        Command::LowStock(threshold) => {
            admin::low_stock(&bot, &msg, &pharmacy, threshold.trim(), state.low_stock_threshold)
                .await?
        }
    }

    Ok(())
}

/// Handles plain-text messages, which come from the keyboard menu.
pub async fn handle_message(bot: Bot, msg: Message, state: AppState) -> Result<(), Error> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    match text {
        CATALOG_BUTTON => {
            let session = state.session(msg.chat.id).await;
            let pharmacy = session.lock().await;
            inventory::list_catalog(&bot, &msg, &pharmacy, "", None).await?;
        }
        CART_BUTTON => {
            let session = state.session(msg.chat.id).await;
            let pharmacy = session.lock().await;
            order::show_cart(&bot, &msg, &pharmacy).await?;
        }
        HELP_BUTTON => send_help(&bot, &msg).await?,
        _ => {
            bot.send_message(
                msg.chat.id,
                "I don't understand that. Please use the menu or type /help for available commands.",
            )
            .await?;
        }
    }
    Ok(())
}

fn main_menu() -> ReplyMarkup {
    let keyboard = KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(CATALOG_BUTTON)],
        vec![KeyboardButton::new(CART_BUTTON)],
        vec![KeyboardButton::new(HELP_BUTTON)],
    ])
    .resize_keyboard();
    ReplyMarkup::Keyboard(keyboard)
}

async fn send_help(bot: &Bot, msg: &Message) -> Result<(), Error> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}
