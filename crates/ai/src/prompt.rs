//! System prompt construction.

use storefront_core::Money;

use crate::{ChatContext, Locale};

/// Upper bound on catalog entries embedded in the prompt.
pub const MAX_PROMPT_PRODUCTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreProfile {
    pub name: String,
    pub phone: String,
    pub payment_methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub slug: String,
    pub name: String,
    pub price: Money,
    pub category: String,
    pub in_stock: bool,
    pub image: Option<String>,
}

const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

/// Price in major units without symbols, trailing `.00` dropped.
fn plain_price(price: Money) -> String {
    let minor = price.minor();
    if minor % 100 == 0 {
        (minor / 100).to_string()
    } else {
        format!("{}.{:02}", minor / 100, (minor % 100).abs())
    }
}

fn product_lines(products: &[CatalogEntry]) -> String {
    if products.is_empty() {
        return "No products available.".to_string();
    }
    products
        .iter()
        .take(MAX_PROMPT_PRODUCTS)
        .map(|p| {
            format!(
                "- slug=\"{}\" | name=\"{}\" | price={} | category=\"{}\" | inStock={} | image=\"{}\"",
                p.slug,
                p.name,
                plain_price(p.price),
                p.category,
                p.in_stock,
                p.image.as_deref().unwrap_or(PLACEHOLDER_IMAGE)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn capabilities(ctx: &ChatContext, locale: Locale) -> String {
    let name = ctx.user_name.as_deref().unwrap_or("User");
    match (ctx.is_logged_in(), locale) {
        (true, Locale::Bn) => format!(
            "## ORDER & SUPPORT CAPABILITIES (LOGGED IN USER)\n\
             আপনি একজন logged-in customer \"{name}\" এর সাথে কথা বলছেন।\n\n\
             1. **Orders দেখানো**: getCustomerOrders tool ব্যবহার করুন\n\
             2. **Order Status**: getOrderStatus tool ব্যবহার করুন\n\
             3. **Support Ticket**: Complaint বা সমস্যা হলে createSupportTicket tool ব্যবহার করুন\n\n\
             Tool result পাওয়ার পর response সুন্দরভাবে format করুন।"
        ),
        (true, Locale::En) => format!(
            "## ORDER & SUPPORT CAPABILITIES (LOGGED IN USER)\n\
             You are chatting with a logged-in customer \"{name}\".\n\n\
             1. **Show Orders**: Use getCustomerOrders when the customer wants to see orders\n\
             2. **Order Status**: Use getOrderStatus to check a specific order\n\
             3. **Support Ticket**: Use createSupportTicket for complaints or issues\n\n\
             Format the tool results nicely in your response."
        ),
        (false, Locale::Bn) => "## ORDER & SUPPORT CAPABILITIES (GUEST USER)\n\
             এই user logged in নয়।\n\n\
             - Orders দেখতে বা order status জানতে বলুন: \"দয়া করে login করুন আপনার orders দেখতে।\"\n\
             - Support ticket এর জন্য guest ও তৈরি করতে পারে যদি phone number দেয়।"
            .to_string(),
        (false, Locale::En) => "## ORDER & SUPPORT CAPABILITIES (GUEST USER)\n\
             This user is not logged in.\n\n\
             - For orders or order status, say: \"Please login to view your orders.\"\n\
             - Guests can still create support tickets if they provide a phone number."
            .to_string(),
    }
}

pub fn system_prompt(store: &StoreProfile, products: &[CatalogEntry], ctx: &ChatContext, locale: Locale) -> String {
    let bn = locale.is_bengali();
    let language = if bn {
        "Bengali (Bangla). Use English only if the user writes in English or for technical terms."
    } else {
        "English. Use Bengali only if the user writes in Bengali."
    };
    let greeting = if bn { "Use \"আসসালামু আলাইকুম\"" } else { "Use \"Hello\" or \"Hi\"" };
    let add_to_cart = if bn {
        "প্রোডাক্ট কার্ডে ক্লিক করুন এবং Add to Cart করুন!"
    } else {
        "Click the product card and Add to Cart!"
    };
    let payments = if store.payment_methods.is_empty() {
        "Cash on delivery".to_string()
    } else {
        store.payment_methods.join(", ")
    };

    format!(
        "You are a customer support assistant for \"{name}\".\n\n\
         LANGUAGE: {language}\n\
         GREETING: {greeting}. Never use \"Namaskar\".\n\n\
         {capabilities}\n\n\
         ## PRODUCT DISPLAY FORMAT (MANDATORY)\n\
         When showing products, use this exact format:\n\
         [PRODUCT:slug:name:price:category:inStock:imageUrl]\n\n\
         ## AVAILABLE PRODUCTS\n\
         {products}\n\n\
         ## RULES\n\
         1. When the user asks about products, respond with 3-5 [PRODUCT:...] tags\n\
         2. Use the exact slug from the product list; never invent slugs\n\
         3. Price is a number only, without currency symbols\n\
         4. Use the image path exactly as listed\n\
         5. Confirm created tickets with the ticket number prominently\n\n\
         ## ORDERING\n\
         - Tell customers: \"{add_to_cart}\"\n\
         - Never take orders directly in chat\n\n\
         ## STORE INFO\n\
         - Store: {name}\n\
         - Payment: {payments}\n\
         - Contact: {phone}",
        name = store.name,
        capabilities = capabilities(ctx, locale),
        products = product_lines(products),
        phone = store.phone,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::UserId;

    fn store() -> StoreProfile {
        StoreProfile { name: "Dhaka Cafe".into(), phone: "+8801700000000".into(), payment_methods: vec![] }
    }

    fn entry(i: usize) -> CatalogEntry {
        CatalogEntry {
            slug: format!("dish-{i}"),
            name: format!("Dish {i}"),
            price: Money::from_minor(25_050),
            category: "Mains".into(),
            in_stock: true,
            image: None,
        }
    }

    #[test]
    fn embeds_at_most_fifty_products() {
        let products: Vec<_> = (0..60).map(entry).collect();
        let prompt = system_prompt(&store(), &products, &ChatContext::guest(), Locale::En);

        assert!(prompt.contains("slug=\"dish-49\""));
        assert!(!prompt.contains("slug=\"dish-50\""));
        assert!(prompt.contains("price=250.50"));
        assert!(prompt.contains("image=\"/placeholder.svg\""));
        assert!(prompt.contains("GUEST USER"));
    }

    #[test]
    fn logged_in_prompt_names_the_customer() {
        let ctx = ChatContext { user_id: Some(UserId::new()), user_name: Some("Nusrat".into()), ..ChatContext::guest() };
        let prompt = system_prompt(&store(), &[], &ctx, Locale::Bn);

        assert!(prompt.contains("\"Nusrat\""));
        assert!(prompt.contains("No products available."));
        assert!(prompt.contains("Cash on delivery"));
    }

    #[test]
    fn whole_prices_drop_the_fraction() {
        assert_eq!(plain_price(Money::from_major(120)), "120");
    }
}
