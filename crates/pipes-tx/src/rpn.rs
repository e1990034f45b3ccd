use pipes_core::{ExprEngine, PipesError, Result, RpnHost};

/// How many output elements `run` produces per call. Chosen as a round
/// working-set size for the reference evaluator; the real constraint
/// (matching the upstream tool's own `RPN_CHUNKSIZE`) is just "big enough
/// that refilling the window isn't the bottleneck."
pub const RPN_CHUNKSIZE: i64 = 8192;

#[derive(Debug, Clone, Copy)]
enum Token {
    Sink(usize),
    Lit(f64),
    Add,
    Sub,
    Mul,
    Div,
    Sqrt,
    Abs,
    Neg,
}

/// A minimal reverse-Polish-notation stack evaluator: comma-separated
/// tokens, `$k` references the k'th (1-based) sink as a pulled array,
/// float literals push constants, `+ - * /` are binary, `sqrt abs neg`
/// are unary. Not a general expression language - just enough to drive
/// `RpnMath` and exercise the `ExprEngine` collaborator contract.
pub struct Engine {
    script: Vec<Token>,
    complex: bool,
    output_flag: bool,
    buf: Vec<f64>,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            script: Vec::new(),
            complex: false,
            output_flag: false,
            buf: vec![0.0; (2 * RPN_CHUNKSIZE) as usize],
        }
    }

    fn max_sink_index(&self) -> Option<usize> {
        self.script
            .iter()
            .filter_map(|t| match t {
                Token::Sink(i) => Some(*i),
                _ => None,
            })
            .max()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprEngine for Engine {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn compile(&mut self, script: &str) -> Result<()> {
        let mut tokens = Vec::new();
        for raw in script.split(',') {
            let tok = raw.trim();
            if tok.is_empty() {
                continue;
            }
            let parsed = if let Some(rest) = tok.strip_prefix('$') {
                let idx: usize = rest
                    .parse()
                    .map_err(|_| PipesError::Expr(format!("bad sink reference {tok}")))?;
                if idx == 0 {
                    return Err(PipesError::Expr("sink references are 1-based".into()));
                }
                Token::Sink(idx - 1)
            } else {
                match tok {
                    "+" => Token::Add,
                    "-" => Token::Sub,
                    "*" => Token::Mul,
                    "/" => Token::Div,
                    "sqrt" => Token::Sqrt,
                    "abs" => Token::Abs,
                    "neg" => Token::Neg,
                    _ => Token::Lit(
                        tok.parse()
                            .map_err(|_| PipesError::Expr(format!("unrecognized token {tok}")))?,
                    ),
                }
            };
            tokens.push(parsed);
        }
        if tokens.is_empty() {
            return Err(PipesError::Expr("empty script".into()));
        }
        self.script = tokens;
        Ok(())
    }

    fn set_complex(&mut self, complex: bool) {
        self.complex = complex;
    }

    fn set_output_flag(&mut self, flag: bool) {
        self.output_flag = flag;
    }

    fn run(&mut self, host: &dyn RpnHost, n: i64, offset: i64) -> &[f64] {
        let n = n as usize;
        let n_sinks = self.max_sink_index().map(|m| m + 1).unwrap_or(0);

        if self.complex {
            let mut re_in = vec![vec![0.0f64; n]; n_sinks];
            let mut im_in = vec![vec![0.0f64; n]; n_sinks];
            for k in 0..n_sinks {
                host.input_complex(k, offset, &mut re_in[k], &mut im_in[k]);
            }
            let mut stack_re: Vec<f64> = Vec::new();
            let mut stack_im: Vec<f64> = Vec::new();
            for i in 0..n {
                stack_re.clear();
                stack_im.clear();
                eval_complex(&self.script, &re_in, &im_in, i, &mut stack_re, &mut stack_im);
                self.buf[i] = *stack_re.last().expect("script leaves a result on the stack");
                self.buf[RPN_CHUNKSIZE as usize + i] =
                    *stack_im.last().expect("script leaves a result on the stack");
            }
        } else {
            let mut inputs = vec![vec![0.0f64; n]; n_sinks];
            for k in 0..n_sinks {
                host.input(k, offset, &mut inputs[k]);
            }
            let mut stack: Vec<f64> = Vec::new();
            for i in 0..n {
                stack.clear();
                eval_real(&self.script, &inputs, i, &mut stack);
                self.buf[i] = *stack.last().expect("script leaves a result on the stack");
            }
        }
        &self.buf[..]
    }

    fn capacity(&self) -> i64 {
        RPN_CHUNKSIZE
    }
}

fn eval_real(script: &[Token], inputs: &[Vec<f64>], i: usize, stack: &mut Vec<f64>) {
    for tok in script {
        match *tok {
            Token::Sink(k) => stack.push(inputs[k][i]),
            Token::Lit(v) => stack.push(v),
            Token::Add => binop(stack, |a, b| a + b),
            Token::Sub => binop(stack, |a, b| a - b),
            Token::Mul => binop(stack, |a, b| a * b),
            Token::Div => binop(stack, |a, b| a / b),
            Token::Sqrt => unop(stack, f64::sqrt),
            Token::Abs => unop(stack, f64::abs),
            Token::Neg => unop(stack, |a| -a),
        }
    }
}

fn binop(stack: &mut Vec<f64>, f: impl Fn(f64, f64) -> f64) {
    let b = stack.pop().expect("binary op needs two operands");
    let a = stack.pop().expect("binary op needs two operands");
    stack.push(f(a, b));
}

fn unop(stack: &mut Vec<f64>, f: impl Fn(f64) -> f64) {
    let a = stack.pop().expect("unary op needs one operand");
    stack.push(f(a));
}

fn eval_complex(
    script: &[Token],
    re_in: &[Vec<f64>],
    im_in: &[Vec<f64>],
    i: usize,
    re: &mut Vec<f64>,
    im: &mut Vec<f64>,
) {
    for tok in script {
        match *tok {
            Token::Sink(k) => {
                re.push(re_in[k][i]);
                im.push(im_in[k][i]);
            }
            Token::Lit(v) => {
                re.push(v);
                im.push(0.0);
            }
            Token::Add => {
                let (br, bi) = (re.pop().unwrap(), im.pop().unwrap());
                let (ar, ai) = (re.pop().unwrap(), im.pop().unwrap());
                re.push(ar + br);
                im.push(ai + bi);
            }
            Token::Sub => {
                let (br, bi) = (re.pop().unwrap(), im.pop().unwrap());
                let (ar, ai) = (re.pop().unwrap(), im.pop().unwrap());
                re.push(ar - br);
                im.push(ai - bi);
            }
            Token::Mul => {
                let (br, bi) = (re.pop().unwrap(), im.pop().unwrap());
                let (ar, ai) = (re.pop().unwrap(), im.pop().unwrap());
                re.push(ar * br - ai * bi);
                im.push(ar * bi + ai * br);
            }
            Token::Div => {
                let (br, bi) = (re.pop().unwrap(), im.pop().unwrap());
                let (ar, ai) = (re.pop().unwrap(), im.pop().unwrap());
                let denom = br * br + bi * bi;
                re.push((ar * br + ai * bi) / denom);
                im.push((ai * br - ar * bi) / denom);
            }
            Token::Neg => {
                let (ar, ai) = (re.pop().unwrap(), im.pop().unwrap());
                re.push(-ar);
                im.push(-ai);
            }
            Token::Abs => {
                let (ar, ai) = (re.pop().unwrap(), im.pop().unwrap());
                re.push((ar * ar + ai * ai).sqrt());
                im.push(0.0);
            }
            Token::Sqrt => {
                let (ar, ai) = (re.pop().unwrap(), im.pop().unwrap());
                let r = (ar * ar + ai * ai).sqrt();
                let theta = ai.atan2(ar);
                re.push(r.sqrt() * (theta / 2.0).cos());
                im.push(r.sqrt() * (theta / 2.0).sin());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstHost(Vec<f64>);
    impl RpnHost for ConstHost {
        fn dims(&self, _which: usize) -> String {
            "x".to_string()
        }
        fn dim_extent(&self, _which: usize, _dim: char) -> i64 {
            self.0.len() as i64
        }
        fn input(&self, which: usize, offset: i64, buf: &mut [f64]) {
            let v = self.0[which];
            buf.fill(v + offset as f64 * 0.0);
        }
        fn input_complex(&self, _which: usize, _offset: i64, re: &mut [f64], im: &mut [f64]) {
            re.fill(1.0);
            im.fill(0.0);
        }
    }

    #[test]
    fn sums_two_sinks() {
        let host = ConstHost(vec![2.0, 3.0]);
        let mut engine = Engine::new();
        engine.compile("$1,$2,+").unwrap();
        let out = engine.run(&host, 4, 0);
        assert_eq!(&out[..4], &[5.0, 5.0, 5.0, 5.0]);
    }

    #[test]
    fn rejects_malformed_script() {
        let mut engine = Engine::new();
        assert!(engine.compile("$1,bogus").is_err());
    }
}
