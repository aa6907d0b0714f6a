//! Table-driven tests for pulling a book out of an agent's confirmation.

use game_maker_core::extract_book_fact;

/// (agent message, expected title and author)
const CASES: &[(&str, Option<(&str, &str)>)] = &[
    (
        "Is that \"Charlotte's Web\" by E.B. White?",
        Some(("Charlotte's Web", "E.B. White")),
    ),
    ("I'm so happy that we're talking about this book!", None),
    (
        "Is that 'Where the Wild Things Are' by Maurice Sendak?",
        Some(("Where the Wild Things Are", "Maurice Sendak")),
    ),
    (
        "Oh, you mean “The Gruffalo” by Julia Donaldson! I love that one.",
        Some(("The Gruffalo", "Julia Donaldson")),
    ),
    (
        "Yay! We're talking about \"Dragons Love Tacos\" by Adam Rubin, a very silly book.",
        Some(("Dragons Love Tacos", "Adam Rubin")),
    ),
    (
        "I've confirmed it's \"Frog and Toad\" by Arnold Lobel. What was your favorite part?",
        Some(("Frog and Toad", "Arnold Lobel")),
    ),
    (
        "Is that \"Oh, the Places You'll Go!\" by Dr. Seuss?",
        Some(("Oh, the Places You'll Go!", "Dr. Seuss")),
    ),
    (
        "That's great! Is that \"Matilda\" by Roald Dahl? 📚",
        Some(("Matilda", "Roald Dahl")),
    ),
    (
        "I just love \"Pete the Cat\" by James Dean\nWhat happened in the story?",
        Some(("Pete the Cat", "James Dean")),
    ),
    ("Is that \"It\" by Al?", None),
    ("I'm so sure it's by Beatrix Potter!", None),
    ("What's your favorite part of the story? 🐉", None),
    ("Is that \"Holes\" by louis sachar?", None),
];

#[test]
fn test_book_extraction_table() {
    for (message, expected) in CASES {
        let actual = extract_book_fact(message);
        let actual_pair = actual
            .as_ref()
            .map(|book| (book.title.as_str(), book.author.as_str()));
        assert_eq!(actual_pair, *expected, "message: {message}");
    }
}

#[test]
fn test_extracted_book_has_summary() {
    let book = extract_book_fact("Is that \"Charlotte's Web\" by E.B. White?").unwrap();
    assert_eq!(book.summary.as_deref(), Some("A wonderful book by E.B. White"));
}

#[test]
fn test_first_pattern_wins() {
    let message = "You said \"Frog and Toad\" by Arnold Lobel, but is that \"Frog and Toad Together\" by Arnold Lobel?";
    let book = extract_book_fact(message).unwrap();
    assert_eq!(book.title, "Frog and Toad Together");
}
