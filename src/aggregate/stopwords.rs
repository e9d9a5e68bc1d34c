/// English function words.
pub const STOP_WORDS: &[&str] = &[
    "a", "able", "about", "across", "after", "all", "almost", "also", "am", "among", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "but", "by", "can", "cannot", "could",
    "dear", "did", "do", "does", "either", "else", "ever", "every", "for", "from", "get", "got",
    "had", "has", "have", "he", "her", "hers", "him", "his", "how", "however", "i", "if", "in",
    "into", "is", "it", "its", "just", "least", "let", "like", "likely", "may", "me", "might",
    "most", "must", "my", "neither", "no", "nor", "not", "of", "off", "often", "on", "only", "or",
    "other", "our", "own", "rather", "said", "say", "says", "she", "should", "since", "so", "some",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "tis", "to",
    "too", "twas", "us", "wants", "was", "we", "were", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "would", "yet", "you", "your",
];

/// Words that dominate any biomedical abstract and say nothing about the topic.
pub const BOILERPLATE: &[&str] = &[
    "de", "la", "el", "en", "lo", "del", "que", "et", "le", "un", "du", "des", "medical",
    "clinical", "health", "hospital", "participant", "participants", "patient", "patients",
    "scheme", "schemes", "program", "programs", "programme", "programmes", "center", "centers",
    "centre", "centres", "abstract", "introduction", "background", "method", "methods", "result",
    "results", "conclusion", "conclusions", "findings", "outcome", "evidence", "aim", "aims", "doi",
    "gene", "genes", "genome", "proteins", "protein", "cell", "cells", "disease", "diseases",
    "syndrome", "syndromes", "symptom", "symptoms", "test", "tests", "study", "studies", "work",
    "experiment", "experiments", "technique", "techniques", "technical", "analysis", "analyses",
    "analysing", "criteria", "day", "days", "time", "hour", "hours", "recent", "during", "effect",
    "effects", "used", "using", "compare", "compared", "comparison", "confirm", "confirmed",
    "confirmation", "association", "associated", "available", "availability", "previously",
    "report", "reports", "reported", "unreported", "many", "more", "less", "fewer", "number",
    "numbers", "large", "larger", "level", "levels", "total", "different", "further", "such",
    "well", "including", "being", "within", "anti", "data", "show", "shown", "case", "cases",
    "control", "controls", "one", "two", "three", "four", "five",
];

pub fn is_noise_word(lowercase: &str) -> bool {
    STOP_WORDS.contains(&lowercase) || BOILERPLATE.contains(&lowercase)
}
