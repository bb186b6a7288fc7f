use teloxide::types::{KeyboardButton, KeyboardMarkup};

pub(crate) fn yes_no_keyboard() -> KeyboardMarkup {
    let keyboard: Vec<Vec<KeyboardButton>> = vec![vec![
        KeyboardButton::new("Yes✔️"),
        KeyboardButton::new("No❌"),
    ]];

    KeyboardMarkup::new(keyboard)
}

pub(crate) fn mode_keyboard() -> KeyboardMarkup {
    let keyboard = vec![
        vec![KeyboardButton::new("Standard")],
        vec![KeyboardButton::new("Marathon")],
        vec![KeyboardButton::new("Sectional")],
    ];

    KeyboardMarkup::new(keyboard)
}

pub(crate) fn penalty_keyboard() -> KeyboardMarkup {
    let keyboard = vec![
        vec![KeyboardButton::new("None")],
        vec![
            KeyboardButton::new("0.25"),
            KeyboardButton::new("0.5"),
            KeyboardButton::new("1"),
        ],
    ];

    KeyboardMarkup::new(keyboard)
}

pub(crate) fn options_keyboard(count: usize) -> KeyboardMarkup {
    let keyboard = (1..=count)
        .collect::<Vec<_>>()
        .chunks(5)
        .map(|row| {
            row.iter()
                .map(|n| KeyboardButton::new(n.to_string()))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    KeyboardMarkup::new(keyboard)
}

pub(crate) fn quizes_keyboard(quizes: &[String]) -> KeyboardMarkup {
    let keyboard = quizes
        .iter()
        .map(|quiz| vec![KeyboardButton::new(format!("/play {quiz}"))]);

    KeyboardMarkup::new(keyboard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_numbers_wrap_every_five() {
        let keyboard = options_keyboard(7);
        let rows: Vec<usize> = keyboard.keyboard.iter().map(Vec::len).collect();
        assert_eq!(rows, vec![5, 2]);
        assert_eq!(keyboard.keyboard[1][1].text, "7");
    }
}
