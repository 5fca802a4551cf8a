use lazy_static::lazy_static;
use regex::Regex;

use super::Stemmer;

lazy_static! {
    // Splits a word into everything up to the first vowel and the region after it.
    static ref RV: Regex = Regex::new(r"^(.*?[аеиоуюяіїє])(.*)$").expect("valid regex");
    static ref PERFECTIVE_GROUND: Regex = Regex::new(r"(ив|ивши|ившись|ів|івши|івшись)$").expect("valid regex");
    static ref REFLEXIVE: Regex = Regex::new(r"(с[яьи])$").expect("valid regex");
    static ref ADJECTIVE: Regex = Regex::new(
        r"(ими|ій|ий|а|е|ова|ове|ів|є|їй|єє|еє|я|ім|ем|им|их|іх|ою|йми|іми|у|ю|ого|ому|ої)$"
    ).expect("valid regex");
    static ref PARTICIPLE: Regex = Regex::new(r"(ий|ого|ому|им|ім|а|ій|у|ою|і|их|йми)$").expect("valid regex");
    static ref VERB: Regex = Regex::new(
        r"(сь|ся|ив|ать|ять|у|ю|ав|али|учи|ячи|вши|ши|е|ме|ати|яти|є)$"
    ).expect("valid regex");
    static ref NOUN: Regex = Regex::new(
        r"(а|ев|ов|е|ями|ами|еи|и|ей|ой|ий|й|иям|ям|ием|ем|ам|ом|о|у|ах|иях|ях|ы|ь|ию|ью|ю|ия|ья|я|і|ові|ї|ею|єю|ою|є|еві|єм|ів|їв|'ю)$"
    ).expect("valid regex");
    static ref TRAILING_I: Regex = Regex::new(r"[иi]$").expect("valid regex");
    static ref DERIVATIONAL: Regex = Regex::new(
        r"[^аеиоуюяіїє][аеиоуюяіїє]+[^аеиоуюяіїє]+(?:о|[аеиоуюяіїє].*о)сть?$"
    ).expect("valid regex");
    static ref DERIVATIONAL_SUFFIX: Regex = Regex::new(r"сть?$").expect("valid regex");
    static ref SOFT_SIGN: Regex = Regex::new(r"ь$").expect("valid regex");
    static ref SUPERLATIVE: Regex = Regex::new(r"ейше?").expect("valid regex");
    static ref DOUBLE_N: Regex = Regex::new(r"нн$").expect("valid regex");
}

/// Stems never shrink below this many characters.
const MIN_STEM_CHARS: usize = 2;

/// Suffix-stripping stemmer for Ukrainian.
#[derive(Debug, Default, Clone, Copy)]
pub struct UkrainianStemmer;

fn strip(s: &mut String, re: &Regex, to: &str) -> bool {
    let replaced = re.replace_all(s, to).into_owned();
    if replaced == *s {
        return false;
    }
    *s = replaced;
    true
}

impl Stemmer for UkrainianStemmer {
    fn name(&self) -> &'static str {
        "ukrainian"
    }

    fn stem(&self, token: &str) -> String {
        let word = token.to_lowercase();
        let Some(caps) = RV.captures(&word) else {
            return word;
        };
        let start = caps[1].to_string();
        let mut rv = caps[2].to_string();
        if rv.is_empty() {
            return word;
        }

        if !strip(&mut rv, &PERFECTIVE_GROUND, "") {
            strip(&mut rv, &REFLEXIVE, "");
            if strip(&mut rv, &ADJECTIVE, "") {
                strip(&mut rv, &PARTICIPLE, "");
            } else if !strip(&mut rv, &VERB, "") {
                strip(&mut rv, &NOUN, "");
            }
        }

        strip(&mut rv, &TRAILING_I, "");

        if DERIVATIONAL.is_match(&rv) {
            strip(&mut rv, &DERIVATIONAL_SUFFIX, "");
        }

        if !strip(&mut rv, &SOFT_SIGN, "") {
            strip(&mut rv, &SUPERLATIVE, "");
            strip(&mut rv, &DOUBLE_N, "н");
        }

        let stem = start + &rv;
        if stem.chars().count() < MIN_STEM_CHARS {
            return word;
        }
        stem
    }
}
