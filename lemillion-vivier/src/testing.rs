//! Historiques synthétiques pour les tests et les démonstrations.
//! Index 0 = tirage le plus récent, un mardi/vendredi sur deux.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use lemillion_db::models::Draw;

fn latest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap_or_default()
}

/// Date du i-ème tirage en remontant le temps (vendredi, mardi, vendredi...).
fn date_at(i: usize) -> (NaiveDate, &'static str) {
    let back = (i / 2) as i64 * 7 + (i % 2) as i64 * 3;
    let day = if i % 2 == 0 { "VENDREDI" } else { "MARDI" };
    (latest_date() - Duration::days(back), day)
}

fn build(n: usize, mut numbers_at: impl FnMut(usize) -> ([u8; 5], [u8; 2])) -> Vec<Draw> {
    (0..n)
        .map(|i| {
            let (date, day) = date_at(i);
            let (balls, stars) = numbers_at(i);
            Draw {
                draw_id: format!("{:05}", n - i),
                day: day.to_string(),
                date,
                balls,
                stars,
            }
        })
        .collect()
}

/// Historique pseudo-aléatoire reproductible.
pub fn make_history(n: usize, seed: u64) -> Vec<Draw> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut balls_pool: Vec<u8> = (1..=50).collect();
    let mut stars_pool: Vec<u8> = (1..=12).collect();

    build(n, |_| {
        balls_pool.shuffle(&mut rng);
        stars_pool.shuffle(&mut rng);
        let balls = [balls_pool[0], balls_pool[1], balls_pool[2], balls_pool[3], balls_pool[4]];
        let stars = [stars_pool[0], stars_pool[1]];
        (balls, stars)
    })
}

/// Historique de période 10 aux fréquences connues.
///
/// Boules sur 10 tirages : 1 et 2 → 10, 3 → 8, 4 → 6, 31 → 4, 30 → 2,
/// 10..=19 → 1 ; les autres n'apparaissent jamais.
/// Étoiles : 1 → 10, 2 → 7, 3, 4, 5 → 1.
/// Toute fenêtre multiple de 10 voit des tendances parfaitement stables.
pub fn periodic_history(n: usize) -> Vec<Draw> {
    build(n, |i| {
        let j = (i % 10) as u8;
        let third = if j < 8 { 3 } else { 30 };
        let fourth = if j < 6 { 4 } else { 31 };
        let balls = [1, 2, third, fourth, 10 + j];
        let second_star = if j < 7 { 2 } else { 3 + (j - 7) };
        (balls, [1, second_star])
    })
}
