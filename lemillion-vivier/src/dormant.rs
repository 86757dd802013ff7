use crate::composition::{Pick, SourceTag};

/// Nombre de remplacements pour un niveau 0..=10 : au moins 1 dès que le niveau est non nul.
pub fn replacement_count(total: usize, level: u8) -> usize {
    if level == 0 || total == 0 {
        return 0;
    }
    let k = (total as f64 * level.min(10) as f64 / 10.0).round() as usize;
    k.clamp(1, total)
}

/// Remplace les membres au score enregistré le plus faible par les plus longues
/// absences absentes de la sélection. La taille de la sélection ne change pas.
///
/// Retourne le nombre de remplacements effectués.
pub fn replace_weakest(
    selection: &mut Vec<Pick>,
    absence_ranking: &[u8],
    level: u8,
    score_of: impl Fn(u8) -> f64,
) -> usize {
    let k = replacement_count(selection.len(), level);
    if k == 0 {
        return 0;
    }

    let injected: Vec<u8> = absence_ranking
        .iter()
        .copied()
        .filter(|n| !selection.iter().any(|p| p.number == *n))
        .take(k)
        .collect();
    if injected.len() < k {
        log::debug!("Dormeurs : {} remplaçant(s) disponible(s) sur {k}", injected.len());
    }

    // Plus faible score d'abord ; à égalité, le plus grand numéro part
    let mut weakest: Vec<usize> = (0..selection.len()).collect();
    weakest.sort_by(|&a, &b| {
        selection[a]
            .score
            .total_cmp(&selection[b].score)
            .then(selection[b].number.cmp(&selection[a].number))
    });
    let mut removed: Vec<usize> = weakest.into_iter().take(injected.len()).collect();
    removed.sort_unstable_by(|a, b| b.cmp(a));
    for idx in removed {
        selection.remove(idx);
    }

    for &number in &injected {
        selection.push(Pick { number, score: score_of(number), source: SourceTag::Dormant });
    }
    injected.len()
}
