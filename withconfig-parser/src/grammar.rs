use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "envfile.pest"]
pub struct EnvFileParser;
