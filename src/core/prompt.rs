//! # Prompt Templates
//!
//! One template per representation method, plus the routing directive.
//! Each builder prompt carries the question, a worked example and the exact
//! output schema the validator will enforce.

use crate::core::method::RepresentationMethod;
use crate::core::validate::{MAX_LABEL_WORDS, MAX_ORIGINS, MAX_SCENARIO_WORDS, MIN_ORIGINS};
use crate::inference::Context;

pub const ROUTER_DIRECTIVE: &str = "You route K-12 math questions to an interactive representation. \
    Identify the math problem that needs to be modeled, decide which tool best models the \
    mathematical concept, and call exactly one tool, passing the question through unchanged. \
    Do not answer the question yourself.";

const BUILDER_DIRECTIVE: &str = "You build interactive K-12 math problems. \
    You answer with a single JSON object and nothing else: no prose, no Markdown.";

const ADDITION_EXAMPLE: &str = r#"{"method": "addition", "scenario": "Youre packing a picnic basket! You have some apples and then pick some more. Drag the apples to the basket to show the total.", "solution": "We combine two groups of apples: 1 apple + 2 apples = 3 apples. Drag one apple and then two apples into the basket, for 3 apples in the basket.", "origins": ["1 Apple", "2 Apples"], "target": "Basket"}"#;

const DELETION_EXAMPLE: &str = r#"{"method": "deletion", "scenario": "You collect 15 berries! Then you eat 5 of them. How many do you have left?", "solution": "We start with 15 berries and take away the 5 we ate, so 15 - 5 = 10 berries are left.", "asset": "berries", "originalCount": 15, "solutionCount": 10}"#;

const DIVISION_EXAMPLE: &str = r#"{"method": "division", "scenario": "You have 12 cookies to share equally among 4 children. How many cookies does each child get?", "solution": "Sharing 12 cookies among 4 children is division: 12 / 4 = 3. Drag 3 cookies to each of the 4 children.", "origin": "cookie", "originCount": 12, "group": "child", "groupCount": 4}"#;

/// Builds the request context for one builder call.
pub fn builder_context(method: RepresentationMethod, question: &str) -> Context {
    let mut context = Context::with_directive(BUILDER_DIRECTIVE);
    context.add_user_message(render(method, question));
    context
}

/// Builds the request context for the routing call.
pub fn router_context(question: &str) -> Context {
    let mut context = Context::with_directive(ROUTER_DIRECTIVE);
    context.add_user_message(question.to_string());
    context
}

/// Renders the user prompt for `method`.
pub fn render(method: RepresentationMethod, question: &str) -> String {
    let (interaction, example, schema, constraints) = match method {
        RepresentationMethod::Addition => (
            "images the user must drag to a single target. To complete the scenario, the user \
             drags the objects in a way that represents the equation",
            ADDITION_EXAMPLE,
            format!(
                r#"{{
  "method": "addition",
  "scenario": string,     // <= {MAX_SCENARIO_WORDS} words, real-world context only
  "solution": string,     // how the user could use math to solve the problem
  "origins": string[],    // captions on the draggable images ({MIN_ORIGINS}-{MAX_ORIGINS} items)
  "target": string        // caption on the target image
}}"#
            ),
            format!(
                "- {MIN_ORIGINS}-{MAX_ORIGINS} origins only.\n\
                 - Every origin is an integer followed by the object, e.g. \"2 Apples\".\n\
                 - Use short, concrete nouns or phrases (<= {MAX_LABEL_WORDS} words) for origins and target."
            ),
        ),
        RepresentationMethod::Deletion => (
            "images the user must click to delete",
            DELETION_EXAMPLE,
            format!(
                r#"{{
  "method": "deletion",
  "scenario": string,     // <= {MAX_SCENARIO_WORDS} words, real-world context only
  "solution": string,     // how the user could use math to solve the problem
  "asset": string,        // the object being deleted
  "originalCount": int,   // number of objects before deletion
  "solutionCount": int    // number of objects after deletion
}}"#
            ),
            format!(
                "- solutionCount <= originalCount, both non-negative.\n\
                 - asset is a short noun (<= {MAX_LABEL_WORDS} words)."
            ),
        ),
        RepresentationMethod::Division => (
            "objects the user must drag into equal groups",
            DIVISION_EXAMPLE,
            format!(
                r#"{{
  "method": "division",
  "scenario": string,     // <= {MAX_SCENARIO_WORDS} words, real-world context only
  "solution": string,     // how the user could use math to solve the problem
  "origin": string,       // the object being distributed
  "originCount": int,     // number of objects
  "group": string,        // what the objects are distributed to
  "groupCount": int       // number of groups, at least 1
}}"#
            ),
            format!(
                "- groupCount >= 1 and originCount >= 0.\n\
                 - origin and group are short nouns (<= {MAX_LABEL_WORDS} words)."
            ),
        ),
    };

    format!(
        "Construct an interactive problem from this math question: {question}\n\
         Create a realistic scenario that mathematically represents the question. \
         The representation is {interaction}.\n\
         For example, a similar question produces:\n{example}\n\n\
         OUTPUT: STRICT JSON matching this schema. Do not include any text outside the JSON.\n\
         SCHEMA:\n{schema}\n\
         CONSTRAINTS:\n{constraints}\n\
         - No equations in the scenario; the scenario carries the story.\n\
         - If the question is ambiguous, choose a reasonable, common K-12 interpretation.\n\
         - Write \"youre\" instead of \"you're\"."
    )
}
