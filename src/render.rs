// Text rendering shared by the terminal chat and the web templates.

use serde::Serialize;

use crate::models::{CarRecord, Message, Role};

/// `30000.0` -> `30000`, `1.25` -> `1.25`.
pub fn format_plain(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

/// Thousands-grouped with at most two decimals: `650000` -> `650,000`.
pub fn format_grouped(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let frac = frac_part.trim_end_matches('0');
    let sign = if value < 0.0 && fixed != "0.00" {
        "-"
    } else {
        ""
    };
    if frac.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac)
    }
}

pub fn format_price(value: f64) -> String {
    format!("₱{}", format_grouped(value))
}

pub fn car_title(car: &CarRecord) -> String {
    format!("{} {} ({})", car.manufacturer, car.model, car.year)
}

pub fn car_specs(car: &CarRecord) -> String {
    format!("Engine: {} | Fuel: {}", car.engine, car.fuel)
}

pub fn car_figures(car: &CarRecord) -> String {
    format!(
        "Mileage: {} | Price: {}",
        format_plain(car.mileage),
        format_price(car.price)
    )
}

/// A car card, ready for the page template.
#[derive(Debug, Clone, Serialize)]
pub struct CarView {
    pub title: String,
    pub specs: String,
    pub figures: String,
}

impl From<&CarRecord> for CarView {
    fn from(car: &CarRecord) -> Self {
        Self {
            title: car_title(car),
            specs: car_specs(car),
            figures: car_figures(car),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub role: Role,
    pub content: String,
    pub cars: Vec<CarView>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            cars: message.cars().iter().map(CarView::from).collect(),
        }
    }
}

/// Plain-text form of a transcript entry for the terminal.
pub fn message_to_terminal(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "You",
        Role::Bot => "Bot",
    };
    let mut out = format!("{}: {}", speaker, message.content);
    for car in message.cars() {
        out.push_str(&format!(
            "\n  - {}\n    {}\n    {}",
            car_title(car),
            car_specs(car),
            car_figures(car)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryResult;

    fn vios() -> CarRecord {
        CarRecord {
            manufacturer: "Toyota".to_string(),
            model: "Vios".to_string(),
            year: 2020,
            fuel: "Gasoline".to_string(),
            engine: "1.5L".to_string(),
            mileage: 30000.0,
            price: 650000.0,
            condition: None,
            source: None,
        }
    }

    #[test]
    fn test_format_plain() {
        assert_eq!(format_plain(30000.0), "30000");
        assert_eq!(format_plain(1.25), "1.25");
        assert_eq!(format_plain(0.0), "0");
        assert_eq!(format_plain(1e20), "100000000000000000000");
    }

    #[test]
    fn test_format_grouped() {
        assert_eq!(format_grouped(0.0), "0");
        assert_eq!(format_grouped(999.0), "999");
        assert_eq!(format_grouped(1000.0), "1,000");
        assert_eq!(format_grouped(650000.0), "650,000");
        assert_eq!(format_grouped(1234567.5), "1,234,567.5");
        assert_eq!(format_grouped(245920.08), "245,920.08");
        assert_eq!(format_grouped(-1500.0), "-1,500");
        assert_eq!(format_grouped(-0.001), "0");
    }

    #[test]
    fn test_car_lines() {
        let car = vios();
        assert_eq!(car_title(&car), "Toyota Vios (2020)");
        assert_eq!(car_specs(&car), "Engine: 1.5L | Fuel: Gasoline");
        assert_eq!(car_figures(&car), "Mileage: 30000 | Price: ₱650,000");
    }

    #[test]
    fn test_message_to_terminal() {
        let user = Message::user("vios");
        assert_eq!(message_to_terminal(&user), "You: vios");

        let bot = Message::bot(QueryResult {
            message: "Here are the cars I found:".to_string(),
            cars: vec![vios()],
        });
        let text = message_to_terminal(&bot);
        assert!(text.starts_with("Bot: Here are the cars I found:"));
        assert!(text.contains("  - Toyota Vios (2020)"));
        assert!(text.contains("Price: ₱650,000"));
    }

    #[test]
    fn test_message_view() {
        let view = MessageView::from(&Message::bot(QueryResult {
            message: "One".to_string(),
            cars: vec![vios()],
        }));
        assert_eq!(view.role, Role::Bot);
        assert_eq!(view.cars.len(), 1);
        assert_eq!(view.cars[0].title, "Toyota Vios (2020)");

        let view = MessageView::from(&Message::user("hi"));
        assert!(view.cars.is_empty());
    }
}
