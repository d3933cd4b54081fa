//! Recognition prompts.
//!
//! The prompt carries the category taxonomy so the model files each payment
//! under one of the user's own categories.

use std::fmt::Write;

use ledger_core::{BillType, Category};

const INTRO: &str = "You are a payment screenshot recognition assistant. \
Analyze this payment screenshot, extract the following information and return it as JSON:";

const NOTES: &str = "Notes:
1. amount must be a plain number without currency symbols
2. bill_type is \"expense\" for money paid out and \"income\" for money received
3. use an empty string or null for any field that cannot be recognized
4. pay_time must be ISO 8601 with offset
5. confidence reflects how reliable the recognition is
6. return only the JSON object, no other text";

const DEFAULT_GUIDE: &str = "Category guide:
- Food: Meals, Snacks, Coffee & Drinks, Fruit & Groceries, Delivery Fees
- Transport: Public Transit, Taxi, Bike Sharing, Fuel & Parking
- Shopping: Daily Goods, Clothing, Electronics, Beauty
- Entertainment: Movies & Shows, Games, Subscriptions, Fitness
- Living: Phone Top-up, Utilities, Healthcare, Delivery, Other Services
- Finance: Transfer, Repayment, Investment, Insurance
";

/// Prompt used when the user's categories are unavailable.
pub fn default_prompt() -> String {
    render(
        "Food/Transport/Shopping/Entertainment/Living/Finance",
        "Salary/Red Packet/Bonus/Other",
        DEFAULT_GUIDE,
    )
}

/// Prompt embedding the user's own expense and income categories.
pub fn build_prompt(categories: &[Category]) -> String {
    let top_level = |kind: BillType| {
        categories
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    };

    let mut guide = String::from("Category guide:\n");
    for category in categories.iter().filter(|c| !c.children.is_empty()) {
        let children: Vec<&str> = category.child_names().collect();
        writeln!(
            guide,
            "- {} ({}): {}",
            category.name,
            category.kind,
            children.join(", ")
        )
        .ok();
    }

    render(&top_level(BillType::Expense), &top_level(BillType::Income), &guide)
}

fn render(expense_names: &str, income_names: &str, guide: &str) -> String {
    let mut category_hint = String::new();
    if !expense_names.is_empty() {
        write!(category_hint, "expense: {}", expense_names).ok();
    }
    if !income_names.is_empty() {
        if !category_hint.is_empty() {
            category_hint.push_str("; ");
        }
        write!(category_hint, "income: {}", income_names).ok();
    }

    format!(
        r#"{INTRO}

{{
  "platform": "payment platform (WeChat Pay/Alipay/Meituan/JD/bank app/other)",
  "amount": amount as a number,
  "merchant": "merchant or counterparty name",
  "bill_type": "expense or income",
  "category": "top-level category ({category_hint})",
  "sub_category": "second-level category",
  "pay_time": "payment time (format: 2006-01-02T15:04:05+08:00)",
  "pay_method": "payment method (balance/bank card/credit/etc.)",
  "order_no": "order number if shown",
  "items": [
    {{"name": "item name", "price": unit price, "quantity": quantity}}
  ],
  "confidence": recognition confidence between 0 and 1
}}

{guide}
{NOTES}"#
    )
}
