use std::collections::HashMap;

use teloxide::types::UserId;

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub user: UserId,
    pub name: String,
    pub score: f64,
}

/// Scores sorted descending; equal scores fall back to ascending user id.
pub fn rank(scores: &HashMap<UserId, f64>, names: &HashMap<UserId, String>) -> Vec<Standing> {
    let mut standings: Vec<Standing> = scores
        .iter()
        .map(|(user, score)| Standing {
            user: *user,
            name: names
                .get(user)
                .cloned()
                .unwrap_or_else(|| format!("user {}", user.0)),
            score: *score,
        })
        .collect();

    standings.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.user.0.cmp(&b.user.0))
    });
    standings
}

pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{score}")
    } else {
        let text = format!("{:.2}", score);
        text.trim_end_matches('0').trim_end_matches('.').to_owned()
    }
}

pub fn render(header: &str, standings: &[Standing]) -> String {
    let mut text = format!("{header}\n");
    if standings.is_empty() {
        text.push_str("Nobody answered.");
        return text;
    }
    for (place, standing) in standings.iter().enumerate() {
        let medal = match place {
            0 => "🥇",
            1 => "🥈",
            2 => "🥉",
            _ => "",
        };
        text.push_str(&format!(
            "\n{}. {}{}: {}",
            place + 1,
            medal,
            standing.name,
            format_score(standing.score)
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_break_by_user_id() {
        let scores = HashMap::from([(UserId(9), 2.0), (UserId(3), 2.0), (UserId(5), 3.5)]);
        let ranked: Vec<u64> = rank(&scores, &HashMap::new())
            .into_iter()
            .map(|s| s.user.0)
            .collect();
        assert_eq!(ranked, vec![5, 3, 9]);
    }

    #[test]
    fn negative_scores_rank_last() {
        let scores = HashMap::from([(UserId(1), -0.25), (UserId(2), 0.0)]);
        let ranked = rank(&scores, &HashMap::new());
        assert_eq!(ranked[0].user, UserId(2));
        assert_eq!(ranked[1].score, -0.25);
    }

    #[test]
    fn scores_render_without_noise() {
        assert_eq!(format_score(1.0), "1");
        assert_eq!(format_score(0.75), "0.75");
        assert_eq!(format_score(-0.5), "-0.5");
        assert_eq!(format_score(-2.0), "-2");
        assert_eq!(format_score(1e20), "100000000000000000000");
    }

    #[test]
    fn render_uses_names_and_handles_empty_boards() {
        let scores = HashMap::from([(UserId(1), 1.0)]);
        let names = HashMap::from([(UserId(1), "Alice".to_string())]);
        let text = render("Final results", &rank(&scores, &names));
        assert_eq!(text, "Final results\n\n1. 🥇Alice: 1");

        assert_eq!(render("Final results", &[]), "Final results\nNobody answered.");
    }
}
