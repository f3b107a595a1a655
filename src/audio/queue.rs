use rand::Rng;
use std::collections::VecDeque;

use crate::sources::Track;

/// Cola FIFO de tracks, propiedad exclusiva de una sesión. El modo
/// aleatorio se aplica únicamente al extraer: el orden visible de la
/// cola no cambia hasta ese momento.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    shuffle: bool,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega al final y devuelve la posición 1-indexada resultante.
    pub fn push(&mut self, track: Track) -> usize {
        self.items.push_back(track);
        self.items.len()
    }

    /// Extrae el siguiente track. Con shuffle activo se elige un índice
    /// aleatorio en el momento de extraer, exactamente una vez por
    /// avance.
    pub fn pop_next(&mut self) -> Option<Track> {
        if self.shuffle && self.items.len() > 1 {
            let index = rand::thread_rng().gen_range(0..self.items.len());
            self.items.remove(index)
        } else {
            self.items.pop_front()
        }
    }

    /// Instantánea ordenada de los títulos, para el listado de cola.
    pub fn titles(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|track| track.title().to_string())
            .collect()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        self.shuffle
    }

    #[allow(dead_code)]
    pub fn is_shuffle(&self) -> bool {
        self.shuffle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::new(
            title.to_string(),
            format!("https://example.com/{title}"),
            format!("https://cdn.example.com/{title}.opus"),
        )
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TrackQueue::new();
        assert_eq!(queue.push(track("a")), 1);
        assert_eq!(queue.push(track("b")), 2);
        assert_eq!(queue.push(track("c")), 3);

        assert_eq!(queue.pop_next().unwrap().title(), "a");
        assert_eq!(queue.pop_next().unwrap().title(), "b");
        assert_eq!(queue.pop_next().unwrap().title(), "c");
        assert!(queue.pop_next().is_none());
    }

    #[test]
    fn test_duplicates_are_allowed() {
        let mut queue = TrackQueue::new();
        queue.push(track("same"));
        queue.push(track("same"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_shuffle_does_not_reorder_listing() {
        let mut queue = TrackQueue::new();
        queue.toggle_shuffle();
        queue.push(track("a"));
        queue.push(track("b"));
        queue.push(track("c"));

        // El listado refleja el orden confirmado aunque shuffle esté
        // activo; la aleatoriedad ocurre recién al extraer.
        assert_eq!(queue.titles(), vec!["a", "b", "c"]);
        assert_eq!(queue.titles(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_shuffle_pop_removes_exactly_one_preserving_rest() {
        let mut queue = TrackQueue::new();
        queue.toggle_shuffle();
        queue.push(track("a"));
        queue.push(track("b"));
        queue.push(track("c"));

        let popped = queue.pop_next().unwrap();
        let remaining = queue.titles();
        assert_eq!(remaining.len(), 2);

        let expected: Vec<String> = ["a", "b", "c"]
            .iter()
            .filter(|title| **title != popped.title())
            .map(|title| title.to_string())
            .collect();
        assert_eq!(remaining, expected);
    }
}
