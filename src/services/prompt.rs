use crate::models::user::{ResponseLanguage, ResponseStyle, SchoolLevel};

/// Build the per-user system instructions for the tutor model from the three
/// stored preferences.
pub fn system_instructions(
    level: SchoolLevel,
    style: ResponseStyle,
    language: ResponseLanguage,
) -> String {
    let level_line = match level {
        SchoolLevel::College => "L'élève est au collège (cycle secondaire collégial marocain).",
        SchoolLevel::TroncCommun => "L'élève est en tronc commun (lycée marocain).",
        SchoolLevel::Bac1 => "L'élève est en première année de baccalauréat (lycée marocain).",
        SchoolLevel::Bac2 => "L'élève est en deuxième année de baccalauréat (lycée marocain).",
        SchoolLevel::Prepa => "L'élève est en classes préparatoires aux grandes écoles.",
    };

    let style_line = match style {
        ResponseStyle::Steps => {
            "Réponds de manière didactique : détaille chaque étape du raisonnement, \
             justifie chaque passage et rappelle les théorèmes utilisés."
        }
        ResponseStyle::Concept => {
            "Explique d'abord le concept mathématique en jeu, puis montre comment \
             il s'applique à l'exercice, sans dérouler tous les calculs."
        }
        ResponseStyle::Answer => {
            "Donne directement la réponse finale, avec une justification très brève."
        }
    };

    let language_line = match language {
        ResponseLanguage::French => "Réponds exclusivement en français.",
        ResponseLanguage::Arabic => "Réponds exclusivement en arabe standard.",
    };

    format!(
        "Tu es un professeur de mathématiques marocain expérimenté. \
         Tu aides un élève à comprendre et résoudre des exercices de mathématiques \
         du programme marocain. {level_line} {style_line} {language_line} \
         Utilise la notation mathématique usuelle. Si l'énoncé est illisible ou \
         incomplet, demande une reformulation au lieu d'inventer."
    )
}
