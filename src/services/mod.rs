pub mod backstory;
pub mod llm;
pub mod prompt_converter;
pub mod script;

#[cfg(test)]
pub(crate) mod testing;
